//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;

use scs_server::config::ServerConfig;
use scs_server::http::{AppState, HttpServer};

/// Token granted to the default test identity.
pub const TOKEN: &str = "integration-test-token";

/// A config/common/secrets tree on disk, plus a users file.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// Create the directory tree with one identity allowed everywhere
    /// under `/configs/` from localhost.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["config", "common", "secrets"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        let fixture = Self { dir };
        fixture.write_users(&[("test-user", TOKEN, &["/configs/*"], &["127.0.0.1"])]);
        fixture
    }

    pub fn write_config(&self, relative: &str, content: &str) {
        write(&self.dir.path().join("config"), relative, content);
    }

    pub fn write_common(&self, relative: &str, content: &str) {
        write(&self.dir.path().join("common"), relative, content);
    }

    pub fn write_secret(&self, relative: &str, content: &str) {
        write(&self.dir.path().join("secrets"), relative, content);
    }

    /// Overwrite the users file with the given identities.
    pub fn write_users(&self, users: &[(&str, &str, &[&str], &[&str])]) {
        let mut out = String::new();
        for (id, token, paths, networks) in users {
            out.push_str(&format!("- id: {id}\n  token: {token}\n  has_access:\n"));
            out.push_str("    to_paths:\n");
            for path in *paths {
                out.push_str(&format!("      - '{path}'\n"));
            }
            out.push_str("    from_networks:\n");
            for network in *networks {
                out.push_str(&format!("      - {network}\n"));
            }
        }
        if users.is_empty() {
            out.push_str("[]\n");
        }
        std::fs::write(self.dir.path().join("scs-users.yaml"), out).unwrap();
    }

    /// Server configuration pointing at this tree.
    pub fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.directories.config = self.dir.path().join("config");
        config.directories.common = self.dir.path().join("common");
        config.directories.secrets = Some(self.dir.path().join("secrets"));
        config.auth.users_file = self.dir.path().join("scs-users.yaml");
        config
    }
}

/// Spawn the server on an ephemeral port and return its address.
pub async fn spawn_server(config: ServerConfig) -> SocketAddr {
    let state = AppState::from_config(&config).expect("state should build");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(&config, state);

    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    addr
}

/// A client that never routes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
