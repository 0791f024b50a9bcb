use exowire::exowire_protocol::exosphere::game_flags;
use exowire::prelude::*;
use tracing_subscriber::EnvFilter;

/// Version carried in the trailing field of our `Test` vector.
const PROTOCOL_VERSION: u8 = 0;
const DEFAULT_BIND: &str = "0.0.0.0:8080";

const BOARD_SIZE: f32 = 5000.0;
const STAGE_LENGTH: u16 = 600;
const SHIP: u16 = 1;

// ---------------------------------------------------------------------------
// Per-connection setup
// ---------------------------------------------------------------------------

/// Answers `Connect` with the player's metadata, the current game state and
/// their ship.
fn configure_session(
    session: &mut Session<WebSocketConnection>,
    player_id: u64,
) -> Result<(), ExowireError> {
    let sender = session.sender();
    let conn_id = session.id();

    session.on_message::<ClientMessage, _>(move |msg| match msg {
        ClientMessage::Connect { nickname, password } => {
            tracing::info!(
                %conn_id,
                player_id,
                %nickname,
                has_password = !password.is_empty(),
                "player joined"
            );
            sender.send_message(ServerMessage::Metadata {
                id: player_id,
                board_width: BOARD_SIZE,
                board_height: BOARD_SIZE,
            })?;
            sender.send_message(ServerMessage::GameState {
                flags: game_flags::PLAYING,
                tick: 0,
                stage_length: STAGE_LENGTH,
            })?;
            sender.send_message(ServerMessage::ObjectCreate {
                x: BOARD_SIZE / 2.0,
                y: BOARD_SIZE / 2.0,
                angle: 0.0,
                owner: player_id,
                id: u32::try_from(player_id)?,
                kind: SHIP,
            })?;
            Ok(())
        }
        // Checked by the session's handshake before dispatch.
        ClientMessage::Test(_) => Ok(()),
    })?;

    session.on_close(move || tracing::info!(%conn_id, player_id, "player left"));
    Ok(())
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

async fn serve(
    server: ExowireServer,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ExowireError> {
    let mut next_player: u64 = 1;
    server
        .run_until(
            move |session| {
                let player_id = next_player;
                next_player += 1;
                configure_session(session, player_id)
            },
            shutdown,
        )
        .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind = std::env::var("EXOWIRE_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let server = ExowireServer::builder()
        .bind(&bind)
        .handshake(HandshakeConfig::new(PROTOCOL_VERSION))
        .build()
        .await?;
    tracing::info!(addr = %server.local_addr()?, "exosphere peer listening");

    serve(server, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutting down");
    })
    .await?;
    Ok(())
}
