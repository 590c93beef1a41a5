//! Constrained evaluator (spec §4.4): a [`Sandbox`] compiles user-authored strategy
//! code once and runs its `entry`/`exit` functions under a restricted engine.
//!
//! Rhai is the embedded language rather than a Python-shaped AST walker: its
//! sandboxing story is the spec's contract almost verbatim — `fn` bodies cannot see
//! or write outer scope (no global/nonlocal writes to reach for), the standard
//! library ships no filesystem/network/process/reflection bindings to whitelist
//! against, and `disable_symbol` turns `eval` and `import` into parse errors instead
//! of something we'd have to catch by walking the tree ourselves.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rhai::{Engine, Scope, AST};

use crate::error::SandboxError;
use crate::signals::{EntrySignal, ExitSignal, Position, StrategyContext};

const MAX_OPERATIONS: u64 = 500_000;

/// Compiles and runs one user-authored strategy script under the invariants of
/// spec §4.4. One `Sandbox` is stateless and hermetic — safe to share across
/// concurrent strategy cycles (spec §5 "no shared state between calls").
pub struct Sandbox {
    engine: Arc<Engine>,
    timeout: Duration,
}

impl Sandbox {
    pub fn new(timeout: Duration) -> Self {
        let mut engine = Engine::new();
        engine.disable_symbol("eval");
        engine.disable_symbol("import");
        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_expr_depths(64, 32);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(10_000);
        engine.set_max_map_size(10_000);
        Self { engine: Arc::new(engine), timeout }
    }

    /// Static validation (spec §4.4 step 1): parses to an AST, rejecting disabled
    /// syntax (`eval`, `import`) and ordinary syntax errors before anything runs.
    pub fn compile(&self, source: &str) -> Result<AST, SandboxError> {
        self.engine.compile(source).map_err(|e| classify_parse_error(&e))
    }

    /// Runs `entry(ctx) -> [EntrySignal]` (spec §4.9/§4.10 step 4).
    pub async fn call_entry(&self, ast: AST, ctx: StrategyContext) -> Result<Vec<EntrySignal>, SandboxError> {
        let engine = self.engine.clone();
        let timeout = self.timeout;
        run_with_deadline(timeout, move || {
            let mut scope = Scope::new();
            let ctx_dynamic = rhai::serde::to_dynamic(&ctx)
                .map_err(|e| SandboxError::RuntimeError(format!("encoding context: {e}")))?;
            let result: rhai::Array = engine
                .call_fn(&mut scope, &ast, "entry", (ctx_dynamic,))
                .map_err(|e| classify_eval_error(&e))?;
            result
                .into_iter()
                .map(|v| rhai::serde::from_dynamic::<EntrySignal>(&v).map_err(|e| bad_return(&e)))
                .collect()
        })
        .await
    }

    /// Runs `exit(ctx, position) -> ExitSignal?` (spec §4.10 step 3).
    pub async fn call_exit(
        &self,
        ast: AST,
        ctx: StrategyContext,
        position: Position,
    ) -> Result<Option<ExitSignal>, SandboxError> {
        let engine = self.engine.clone();
        let timeout = self.timeout;
        run_with_deadline(timeout, move || {
            let mut scope = Scope::new();
            let ctx_dynamic = rhai::serde::to_dynamic(&ctx)
                .map_err(|e| SandboxError::RuntimeError(format!("encoding context: {e}")))?;
            let position_dynamic = rhai::serde::to_dynamic(&position)
                .map_err(|e| SandboxError::RuntimeError(format!("encoding position: {e}")))?;
            let result: rhai::Dynamic = engine
                .call_fn(&mut scope, &ast, "exit", (ctx_dynamic, position_dynamic))
                .map_err(|e| classify_eval_error(&e))?;
            if result.is_unit() {
                return Ok(None);
            }
            rhai::serde::from_dynamic::<ExitSignal>(&result).map(Some).map_err(|e| bad_return(&e))
        })
        .await
    }
}

/// Runs a blocking rhai call on a worker thread under a wall-clock ceiling (spec
/// §4.4 step 3). `set_max_operations` above is the backstop that actually makes the
/// detached worker thread terminate if the caller's deadline fires first; the
/// `tokio::time::timeout` is the out-of-band timer the spec calls for.
async fn run_with_deadline<F, T>(timeout: Duration, f: F) -> Result<T, SandboxError>
where
    F: FnOnce() -> Result<T, SandboxError> + Send + 'static,
    T: Send + 'static,
{
    let started = Instant::now();
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(SandboxError::RuntimeError(join_error.to_string())),
        Err(_elapsed) => Err(SandboxError::Timeout { elapsed_ms: started.elapsed().as_millis() as u64 }),
    }
}

fn classify_parse_error(err: &rhai::ParseError) -> SandboxError {
    let message = err.to_string();
    if message.contains("eval") || message.contains("import") {
        SandboxError::ForbiddenImport(message)
    } else {
        SandboxError::SyntaxError(message)
    }
}

fn classify_eval_error(err: &rhai::EvalAltResult) -> SandboxError {
    use rhai::EvalAltResult::*;
    match err {
        ErrorFunctionNotFound(name, _) => SandboxError::ForbiddenCall(name.clone()),
        ErrorModuleNotFound(name, _) => SandboxError::ForbiddenImport(name.clone()),
        ErrorTooManyOperations(_) => SandboxError::Timeout { elapsed_ms: 0 },
        ErrorMismatchDataType(expected, actual, _) => {
            SandboxError::BadReturn(format!("expected {expected}, got {actual}"))
        }
        other => SandboxError::RuntimeError(other.to_string()),
    }
}

fn bad_return(err: impl std::fmt::Display) -> SandboxError {
    SandboxError::BadReturn(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> Sandbox {
        Sandbox::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn entry_returns_signals_in_declared_shape() {
        let sb = sandbox();
        let ast = sb
            .compile(
                r#"
                fn entry(ctx) {
                    [#{ market_id: "AAPL", side: "buy", reason: "momentum", confidence: 0.8 }]
                }
                "#,
            )
            .unwrap();
        let signals = sb.call_entry(ast, StrategyContext::default()).await.unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].market_id, "AAPL");
        assert!((signals[0].confidence - 0.8).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn exit_returns_none_when_script_returns_unit() {
        let sb = sandbox();
        let ast = sb.compile("fn exit(ctx, position) { () }").unwrap();
        let position = Position {
            position_id: "p1".into(),
            market_id: "AAPL".into(),
            side: "buy".into(),
            size: 1.0,
            entry_price: 100.0,
            unrealized_pnl: 0.0,
        };
        let result = sb.call_exit(ast, StrategyContext::default(), position).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn exit_can_return_a_signal() {
        let sb = sandbox();
        let ast = sb
            .compile(r#"fn exit(ctx, position) { #{ position_id: position.position_id, reason: "stop loss" } }"#)
            .unwrap();
        let position = Position {
            position_id: "p1".into(),
            market_id: "AAPL".into(),
            side: "buy".into(),
            size: 1.0,
            entry_price: 100.0,
            unrealized_pnl: -10.0,
        };
        let result = sb.call_exit(ast, StrategyContext::default(), position).await.unwrap().unwrap();
        assert_eq!(result.position_id, "p1");
    }

    #[tokio::test]
    async fn eval_is_rejected_at_compile_time() {
        let sb = sandbox();
        let err = sb.compile(r#"fn entry(ctx) { eval("1+1") }"#).unwrap_err();
        assert!(matches!(err, SandboxError::ForbiddenImport(_) | SandboxError::SyntaxError(_)));
    }

    #[tokio::test]
    async fn import_is_rejected_at_compile_time() {
        let sb = sandbox();
        let err = sb.compile(r#"import "os" as os; fn entry(ctx) { [] }"#).unwrap_err();
        assert!(matches!(err, SandboxError::ForbiddenImport(_) | SandboxError::SyntaxError(_)));
    }

    #[tokio::test]
    async fn calling_an_unregistered_function_is_forbidden_call() {
        let sb = sandbox();
        let ast = sb.compile("fn entry(ctx) { read_file(\"/etc/passwd\") }").unwrap();
        let err = sb.call_entry(ast, StrategyContext::default()).await.unwrap_err();
        assert!(matches!(err, SandboxError::ForbiddenCall(_)));
    }

    #[tokio::test]
    async fn mismatched_return_shape_is_bad_return() {
        let sb = sandbox();
        let ast = sb.compile("fn entry(ctx) { 42 }").unwrap();
        let err = sb.call_entry(ast, StrategyContext::default()).await.unwrap_err();
        assert!(matches!(err, SandboxError::BadReturn(_)));
    }

    #[tokio::test]
    async fn infinite_loop_is_stopped_by_the_operation_ceiling() {
        let sb = sandbox();
        let ast = sb.compile("fn entry(ctx) { let x = 0; loop { x += 1; } }").unwrap();
        let err = sb.call_entry(ast, StrategyContext::default()).await.unwrap_err();
        assert!(matches!(err, SandboxError::Timeout { .. }));
    }
}
