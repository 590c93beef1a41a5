//! Strategy Loader (spec §4.9, C9): fetches a strategy's `entry`/`exit`/`config`
//! ChatFiles, validates the code through the [`sandbox::Sandbox`], parses the config,
//! and returns a runnable [`StrategyBundle`]. Results are cached per
//! `(strategy_id, file versions)`; any ChatFile write bumps its `version`
//! (spec §3 "Upserted on write"), which this loader treats as the cache-invalidation
//! key rather than tracking file content hashes itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use engine::ChatFileStore;
use rhai::AST;
use serde::{Deserialize, Serialize};

use sandbox::Sandbox;

use crate::error::StrategyError;
use crate::model::{Capital, Strategy};

/// The on-disk shape of `config.json` (spec §6.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StrategyFileConfig {
    pub name: String,
    pub thesis: String,
    pub platform: String,
    pub execution_frequency_seconds: u64,
    pub entry_description: String,
    pub exit_description: String,
    pub capital: Capital,
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub mode: String,
}

/// A runnable, validated strategy (spec §4.9's `{entry_fn, exit_fn, config}`). The
/// compiled ASTs are cheap to clone (rhai shares the underlying instruction stream),
/// so callers can hand a bundle to the Executor without re-parsing.
#[derive(Clone, Debug)]
pub struct StrategyBundle {
    pub entry_ast: AST,
    pub exit_ast: AST,
    pub config: StrategyFileConfig,
}

type CacheKey = (String, u32, u32, u32);

pub struct StrategyLoader {
    chat_files: Arc<dyn ChatFileStore>,
    sandbox: Arc<Sandbox>,
    cache: Mutex<HashMap<String, (CacheKey, StrategyBundle)>>,
}

impl StrategyLoader {
    pub fn new(chat_files: Arc<dyn ChatFileStore>, sandbox: Arc<Sandbox>) -> Self {
        Self { chat_files, sandbox, cache: Mutex::new(HashMap::new()) }
    }

    pub async fn load(&self, strategy: &Strategy) -> Result<StrategyBundle, StrategyError> {
        let entry_file = self.fetch(&strategy.chat_id, &strategy.file_ids.entry, strategy).await?;
        let exit_file = self.fetch(&strategy.chat_id, &strategy.file_ids.exit, strategy).await?;
        let config_file = self.fetch(&strategy.chat_id, &strategy.file_ids.config, strategy).await?;

        let key: CacheKey = (strategy.id.clone(), entry_file.version, exit_file.version, config_file.version);
        if let Some((cached_key, bundle)) = self.cache.lock().unwrap().get(&strategy.id) {
            if cached_key == &key {
                return Ok(bundle.clone());
            }
        }

        let entry_ast = self.sandbox.compile(&entry_file.content).map_err(|source| StrategyError::Sandbox {
            strategy_id: strategy.id.clone(),
            function: "entry",
            source,
        })?;
        let exit_ast = self.sandbox.compile(&exit_file.content).map_err(|source| StrategyError::Sandbox {
            strategy_id: strategy.id.clone(),
            function: "exit",
            source,
        })?;
        let config: StrategyFileConfig = serde_json::from_str(&config_file.content)
            .map_err(|e| StrategyError::ConfigError(e.to_string()))?;

        let bundle = StrategyBundle { entry_ast, exit_ast, config };
        self.cache.lock().unwrap().insert(strategy.id.clone(), (key, bundle.clone()));
        Ok(bundle)
    }

    async fn fetch(&self, chat_id: &str, filename: &str, strategy: &Strategy) -> Result<engine::ChatFile, StrategyError> {
        self.chat_files
            .get(chat_id, filename)
            .await
            .map_err(|e| StrategyError::LoadFailed { strategy_id: strategy.id.clone(), reason: e.to_string() })?
            .ok_or_else(|| StrategyError::LoadFailed {
                strategy_id: strategy.id.clone(),
                reason: format!("missing chat file {filename}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileRefs, Mode, SizingMethod, Stats};
    use std::time::Duration;

    fn test_strategy() -> Strategy {
        Strategy {
            id: "s1".into(),
            user_id: "u1".into(),
            chat_id: "c1".into(),
            name: "momentum".into(),
            thesis: "buy the dip".into(),
            platform: "alpaca".into(),
            execution_frequency_seconds: 300,
            capital: Capital { total: 1000.0, per_trade: 100.0, max_positions: 5, max_daily_loss: 200.0, sizing_method: SizingMethod::Fixed },
            parameters: serde_json::json!({}),
            file_ids: FileRefs { entry: "entry.rhai".into(), exit: "exit.rhai".into(), config: "config.json".into() },
            mode: Mode::Paper,
            enabled: true,
            approved: true,
            stats: Stats::default(),
        }
    }

    fn config_json() -> String {
        serde_json::json!({
            "name": "momentum",
            "thesis": "buy the dip",
            "platform": "alpaca",
            "execution_frequency_seconds": 300,
            "entry_description": "buy on momentum",
            "exit_description": "sell on reversal",
            "capital": {"total": 1000.0, "per_trade": 100.0, "max_positions": 5, "max_daily_loss": 200.0, "sizing_method": "fixed"},
            "parameters": {},
            "mode": "paper",
        })
        .to_string()
    }

    async fn make_loader() -> (StrategyLoader, Arc<engine::SqliteChatFileStore>) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let store = Arc::new(engine::SqliteChatFileStore::new(file.path()).unwrap());
        store.upsert("c1", "entry.rhai", "fn entry(ctx) { [] }").await.unwrap();
        store.upsert("c1", "exit.rhai", "fn exit(ctx, position) { () }").await.unwrap();
        store.upsert("c1", "config.json", &config_json()).await.unwrap();
        let sandbox = Arc::new(Sandbox::new(Duration::from_secs(5)));
        (StrategyLoader::new(store.clone(), sandbox), store)
    }

    #[tokio::test]
    async fn loads_a_valid_bundle() {
        let (loader, _store) = make_loader().await;
        let bundle = loader.load(&test_strategy()).await.unwrap();
        assert_eq!(bundle.config.name, "momentum");
    }

    #[tokio::test]
    async fn missing_file_is_a_load_failure() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let store = Arc::new(engine::SqliteChatFileStore::new(file.path()).unwrap());
        let sandbox = Arc::new(Sandbox::new(Duration::from_secs(5)));
        let loader = StrategyLoader::new(store, sandbox);
        let err = loader.load(&test_strategy()).await.unwrap_err();
        assert!(matches!(err, StrategyError::LoadFailed { .. }));
    }

    #[tokio::test]
    async fn invalid_entry_code_surfaces_as_sandbox_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let store = Arc::new(engine::SqliteChatFileStore::new(file.path()).unwrap());
        store.upsert("c1", "entry.rhai", "fn entry(ctx) { eval(\"1\") }").await.unwrap();
        store.upsert("c1", "exit.rhai", "fn exit(ctx, position) { () }").await.unwrap();
        store.upsert("c1", "config.json", &config_json()).await.unwrap();
        let sandbox = Arc::new(Sandbox::new(Duration::from_secs(5)));
        let loader = StrategyLoader::new(store, sandbox);
        let err = loader.load(&test_strategy()).await.unwrap_err();
        assert!(matches!(err, StrategyError::Sandbox { function: "entry", .. }));
    }

    #[tokio::test]
    async fn cache_is_invalidated_when_a_file_version_changes() {
        let (loader, store) = make_loader().await;
        let strategy = test_strategy();
        let first = loader.load(&strategy).await.unwrap();
        assert_eq!(first.config.name, "momentum");

        let mut updated = serde_json::from_str::<serde_json::Value>(&config_json()).unwrap();
        updated["name"] = serde_json::json!("reversal");
        store.upsert("c1", "config.json", &updated.to_string()).await.unwrap();

        let second = loader.load(&strategy).await.unwrap();
        assert_eq!(second.config.name, "reversal");
    }
}
