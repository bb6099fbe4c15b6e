use std::io;
use std::path::PathBuf;

use job_relay::logging::init_tracing;
use job_relay::{Coordinator, EnvConfig, StateStore};
use relay_cli::app::App;
use relay_cli::transports::transport_from_env;
use session_store::{state_root, SnapshotStore};
use tokio::io::BufReader;

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    let env = EnvConfig::from_env().map_err(io::Error::other)?;
    init_tracing(env.debug);

    let setup = transport_from_env(&env).map_err(io::Error::other)?;
    let root = match env.state_dir.clone().or(setup.state_dir.clone()) {
        Some(dir) => dir,
        None => default_state_root()?,
    };
    let store = SnapshotStore::new(root);

    let state = match store.load() {
        Ok(Some(snapshot)) => StateStore::restore(snapshot),
        Ok(None) => StateStore::default(),
        Err(error) => {
            tracing::warn!(%error, path = %store.path().display(), "ignoring unreadable session snapshot");
            StateStore::default()
        }
    };
    tracing::info!(transport = setup.id, path = %store.path().display(), "relay starting");

    let coordinator =
        Coordinator::new(setup.transport, state, setup.delivery).with_snapshot_store(store);
    let mut app = App::new(coordinator, tokio::io::stdout());
    app.run(BufReader::new(tokio::io::stdin())).await
}

fn default_state_root() -> io::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(state_root(&cwd))
}
