use crate::app::context::AppContext;
use crate::app::status::render_status;
use crate::cli::commands::{Cli, Commands, PolicyCommands};
use crate::config::Config;
use crate::recovery::{SweepOutcome, SweepScope};
use anyhow::Result;
use tokio_util::sync::CancellationToken;

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let ctx = AppContext::init(config).await?;

    match cli.command {
        Commands::Migrate => {
            crate::db::apply_migrations(&ctx.pool).await?;
            let revision = crate::db::applied_revision(&ctx.pool)
                .await?
                .unwrap_or_else(|| "none".to_string());
            println!("Database migrated to revision {revision}");
            Ok(())
        }

        Commands::Sweep { board } => {
            let scheduler = ctx.scheduler()?;
            let scope = board.map_or(SweepScope::AllBoards, SweepScope::Board);
            match scheduler.run_once(&scope, &CancellationToken::new()).await? {
                SweepOutcome::NotReady => {
                    println!("Database schema is not ready; run `warden migrate` first.");
                    Ok(())
                }
                SweepOutcome::Completed(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    Ok(())
                }
            }
        }

        Commands::Snapshot { board } => {
            let snapshot = ctx
                .probe()
                .snapshot_for_board(&ctx.pool, &board, &ctx.config.recovery)
                .await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }

        Commands::Daemon => crate::daemon::run(ctx).await,

        Commands::Status => {
            println!("{}", render_status(&ctx).await);
            Ok(())
        }

        Commands::Policy { policy_command } => match policy_command {
            PolicyCommands::Show { org } => {
                let policy = crate::recovery::repository::resolve_policy(
                    &ctx.pool,
                    &org,
                    &ctx.config.recovery,
                )
                .await?;
                println!("{}", serde_json::to_string_pretty(&policy)?);
                Ok(())
            }
        },
    }
}
