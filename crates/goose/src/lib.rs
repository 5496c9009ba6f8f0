use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Applies goose SQL migrations by running the goose binary.
pub struct MigrationRunner {
    goose_binary_path: String,
    migrations_dir: String,
    /// goose driver name, e.g. `postgres`
    driver: String,
    dsn: String,
}

impl MigrationRunner {
    pub fn new(
        goose_binary_path: String,
        migrations_dir: String,
        driver: String,
        dsn: String,
    ) -> Self {
        Self {
            goose_binary_path,
            migrations_dir,
            driver,
            dsn,
        }
    }

    fn command(&self, action: &str) -> Command {
        let mut command = Command::new(&self.goose_binary_path);
        command
            .arg("-dir")
            .arg(&self.migrations_dir)
            .arg(&self.driver)
            .arg(&self.dsn)
            .arg(action)
            .kill_on_drop(true);
        command
    }

    async fn execute(&self, action: &str) -> Result<String> {
        let output = self
            .command(action)
            .output()
            .await
            .with_context(|| format!("Failed to start goose at {}", self.goose_binary_path))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "goose {} failed.\nstdout: {}\nstderr: {}",
                action,
                stdout,
                stderr
            );
        }
        Ok(stdout)
    }

    /// `goose -dir {dir} {driver} {dsn} up`
    pub async fn run_migrations(&self) -> Result<()> {
        info!(migrations_dir = %self.migrations_dir, driver = %self.driver, "Running migrations");
        let stdout = self.execute("up").await?;
        debug!("migrations completed:\n{}", stdout);
        Ok(())
    }

    pub async fn migration_status(&self) -> Result<String> {
        self.execute("status").await
    }
}
