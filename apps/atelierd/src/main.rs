use std::sync::Arc;

use anyhow::Result;
use atelier_kernel::KernelBuilder;
use atelier_protocol::{ClientMessage, SessionId};
use atelier_store::MemorySessionStore;
use clap::Parser;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "atelierd")]
#[command(about = "Atelier sync kernel demo daemon")]
struct Cli {
    #[arg(long, default_value = "demo-consultation")]
    session: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .compact()
        .init();

    let cli = Cli::parse();

    let kernel = KernelBuilder::new(Arc::new(MemorySessionStore::new())).build();
    let session_id = SessionId::from_string(cli.session);
    let session = kernel.open_session(&session_id).await?;
    info!(session_id = %session.id, "session opened");

    let mut events = kernel.subscribe();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(session = %event.session_id, kind = ?event.kind, "session.event");
        }
    });

    let script = [
        ui_response("style_modern", "bold"),
        ui_response("palette_warm", "sunset"),
        ui_response("finish_pick", "matte"),
        ui_response("lighting_pref", "north"),
        ClientMessage::AgentNote {
            message: "client prefers oil over acrylic".to_owned(),
        },
        ClientMessage::TodoConfirm { ok: false },
        ClientMessage::TodoConfirm { ok: true },
    ];

    for message in script {
        let applied = kernel.apply(&session_id, message).await?;
        for reply in &applied.replies {
            info!(reply = %serde_json::to_string(reply)?, "reply");
        }
    }

    let session = kernel
        .session(&session_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("session missing after the call finished"))?;
    info!(
        style = ?session.brief.style,
        palette = ?session.brief.palette,
        finish = ?session.brief.finish,
        constraints = session.brief.constraints.len(),
        "final brief"
    );
    for approval in &session.approvals {
        info!(ts = approval.ts, text = %approval.text, "approval");
    }

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    event_task.abort();
    if let Err(error) = event_task.await {
        if !error.is_cancelled() {
            warn!(%error, "event task stopped");
        }
    }

    Ok(())
}

fn ui_response(prompt_id: &str, selected_option_id: &str) -> ClientMessage {
    ClientMessage::UiResponse {
        prompt_id: prompt_id.to_owned(),
        selected_option_id: selected_option_id.to_owned(),
    }
}
