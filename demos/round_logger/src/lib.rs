//! Demo module package for the hearth host.
//!
//! Build as a `cdylib` and drop the resulting library into the configured
//! package directory, or link it statically and hand `PACKAGE` to
//! `HearthRuntime::register_package`. Configure via the host config:
//!
//! ```toml
//! [modules.round-logger]
//! greeting = "round up!"
//! max_participants = 64
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use hearth_core::{BoxError, Flow, Registration};
use hearth_host::{Module, ModuleContext, ModuleDescriptor, define_module, export_package};
use hearth_macros::Payload;

/// Announced at the start of every game round.
#[derive(Debug, Default, Clone, Payload)]
pub struct RoundStarted {
    pub number: u64,
    pub participants: u32,
}

/// Announced when a round finishes, carrying the winner if any.
#[derive(Debug, Default, Clone, Payload)]
pub struct RoundEnded {
    pub number: u64,
    pub winner: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RoundLoggerConfig {
    greeting: String,
    /// Rounds with more participants than this are vetoed.
    max_participants: u32,
}

impl Default for RoundLoggerConfig {
    fn default() -> Self {
        Self {
            greeting: "round started".to_string(),
            max_participants: 128,
        }
    }
}

/// Logs round events and vetoes rounds that exceed the participant cap.
#[derive(Default)]
pub struct RoundLogger {
    rounds_seen: Arc<AtomicU64>,
}

#[async_trait]
impl Module for RoundLogger {
    // Registrations belong in on_init: they live for the module's whole
    // lifetime (the owner gate silences them while disabled), so registering
    // on every enable would stack duplicates.
    async fn on_init(&self, ctx: &ModuleContext) -> Result<(), BoxError> {
        ctx.declare::<RoundStarted>("round-started")?;
        ctx.declare::<RoundEnded>("round-ended")?;

        let config: RoundLoggerConfig = ctx.config()?;
        let cap = config.max_participants;
        let greeting = config.greeting;
        let seen = Arc::clone(&self.rounds_seen);

        // Runs early so oversized rounds are stopped before anyone else
        // reacts to them.
        ctx.register(
            "round-started",
            Registration::veto(move |round: &mut RoundStarted| {
                if round.participants > cap {
                    warn!(
                        round = round.number,
                        participants = round.participants,
                        cap,
                        "Round over participant cap, vetoing"
                    );
                    return Ok(Flow::Halt);
                }
                Ok(Flow::Continue)
            })
            .priority(100),
        )?;

        ctx.register(
            "round-started",
            Registration::sync(move |round: &mut RoundStarted| {
                seen.fetch_add(1, Ordering::Relaxed);
                info!(
                    round = round.number,
                    participants = round.participants,
                    "{greeting}"
                );
                Ok(())
            }),
        )?;

        ctx.register(
            "round-ended",
            Registration::task(|round: RoundEnded| async move {
                match round.winner {
                    Some(winner) => info!(round = round.number, %winner, "Round won"),
                    None => info!(round = round.number, "Round drawn"),
                }
            }),
        )?;

        Ok(())
    }

    async fn on_enable(&self, _ctx: &ModuleContext) -> Result<(), BoxError> {
        info!("Round logger watching");
        Ok(())
    }

    async fn on_disable(&self, _ctx: &ModuleContext) -> Result<(), BoxError> {
        info!(
            rounds = self.rounds_seen.load(Ordering::Relaxed),
            "Round logger going quiet"
        );
        Ok(())
    }
}

/// The round logger's descriptor, for static linking.
pub const ROUND_LOGGER: ModuleDescriptor = define_module! {
    id: "round-logger",
    module: RoundLogger,
    name: "Round Logger",
    priority: 10,
};

export_package![ROUND_LOGGER];

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::ModuleId;
    use hearth_host::{ModuleManager, ModuleState, PackageLoader};
    use hearth_core::EventEngine;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn logs_and_vetoes_rounds() {
        let engine = Arc::new(EventEngine::new());
        let mut configs = HashMap::new();
        configs.insert(
            "round-logger".to_string(),
            serde_json::json!({ "max_participants": 4 }),
        );
        let manager = ModuleManager::new(Arc::clone(&engine), configs);
        let loader = PackageLoader::new();

        let package = loader.load_static("demo", &[ROUND_LOGGER]);
        manager.install_package(&package).await;
        manager.enable(&ModuleId::new("round-logger")).await.unwrap();
        assert_eq!(
            manager.module_state(&ModuleId::new("round-logger")),
            Some(ModuleState::Enabled)
        );

        let mut small = RoundStarted {
            number: 1,
            participants: 2,
        };
        let outcome = engine.dispatch("round-started", &mut small).unwrap();
        assert!(!outcome.vetoed);
        assert_eq!(outcome.invoked, 2);

        let mut big = RoundStarted {
            number: 2,
            participants: 10,
        };
        let outcome = engine.dispatch("round-started", &mut big).unwrap();
        assert!(outcome.vetoed);
        assert_eq!(outcome.invoked, 1);
    }

    #[tokio::test]
    async fn enable_cycles_do_not_stack_registrations() {
        let engine = Arc::new(EventEngine::new());
        let manager = ModuleManager::new(Arc::clone(&engine), HashMap::new());
        let loader = PackageLoader::new();

        let package = loader.load_static("demo", &[ROUND_LOGGER]);
        manager.install_package(&package).await;

        let id = ModuleId::new("round-logger");
        manager.enable(&id).await.unwrap();
        manager.disable(&id).await.unwrap();
        manager.enable(&id).await.unwrap();

        assert_eq!(engine.handler_count("round-started"), 2);
        let mut round = RoundStarted {
            number: 3,
            participants: 1,
        };
        assert_eq!(
            engine.dispatch("round-started", &mut round).unwrap().invoked,
            2
        );
    }
}
