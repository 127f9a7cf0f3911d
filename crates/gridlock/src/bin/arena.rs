//! Demo arena server: an embedded map, a permissive dev authenticator,
//! and structured logging. Run it, point a WebSocket client at port
//! 8080, handshake with a numeric token, and play.

use gridlock::prelude::*;
use tracing_subscriber::EnvFilter;

/// Accepts any numeric token and uses it as the player id. Development
/// only — a real deployment wires `Authenticator` to its identity
/// provider.
struct DevAuth;

impl Authenticator for DevAuth {
    async fn authenticate(&self, token: &str) -> Result<PlayerId, SessionError> {
        let id: u64 = token
            .parse()
            .map_err(|_| SessionError::AuthFailed("token must be a number".into()))?;
        Ok(PlayerId(id))
    }
}

fn demo_maps() -> MemoryMapStore {
    let catacombs = GameMap::parse(
        "catacombs",
        &[
            "###########",
            "#S...#...S#",
            "#.##.+.##.#",
            "#.#s...b#.#",
            "#.##.#.##.#",
            "#....#..c.#",
            "#S..###..S#",
            "###########",
        ],
    )
    .expect("demo map is well-formed");

    let duel = GameMap::parse(
        "duel",
        &[
            "#######",
            "#S...S#",
            "#..s..#",
            "#######",
        ],
    )
    .expect("demo map is well-formed");

    MemoryMapStore::new().with(catacombs).with(duel)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addr = std::env::var("GRIDLOCK_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    tracing::info!(%addr, "starting arena server");

    let server = GridlockServerBuilder::new()
        .bind(&addr)
        .build(demo_maps(), DevAuth)
        .await?;

    server.run().await?;
    Ok(())
}
