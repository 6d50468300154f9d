use std::sync::Arc;

use investiq_lib::completion::CompletionService;
use investiq_lib::context::InvestiqContext;
use investiq_lib::db::DatabaseDriver;
use investiq_lib::runtime::{Backends, Runtime};
use investiq_lib::settings::Settings;
use investiq_lib::test_util::{CannedWebSearch, EchoCompletion, HashEmbedder, StaticRasterizer};

pub use investiq_lib::test_util::write_fake_pdf;

/// Create a [`Runtime`] with an in-memory database, a tempdir-based context
/// and in-process backends. Page descriptions echo the page text.
///
/// The `name` must be unique per test to prevent cross-test DB collisions.
/// The caller must hold the returned [`tempfile::TempDir`] to keep the
/// temporary directory alive for the duration of the test.
pub fn runtime_in_memory(name: &str) -> (tempfile::TempDir, Runtime) {
    runtime_with_completion(name, Arc::new(EchoCompletion))
}

/// Like [`runtime_in_memory`] with a caller-supplied completion service.
pub fn runtime_with_completion(
    name: &str,
    completion: Arc<dyn CompletionService>,
) -> (tempfile::TempDir, Runtime) {
    let tmp = tempfile::tempdir().unwrap();
    let context = InvestiqContext::new(tmp.path().to_path_buf());
    let db = DatabaseDriver::in_memory(name).unwrap();
    let runtime = Runtime::new(context, Settings::default(), db, fake_backends(completion));
    (tmp, runtime)
}

/// Create a [`Runtime`] whose file-backed database does not exist yet.
pub fn runtime_not_ingested() -> (tempfile::TempDir, Runtime) {
    let tmp = tempfile::tempdir().unwrap();
    let context = InvestiqContext::new(tmp.path().to_path_buf());
    let db = DatabaseDriver::file(context.db_path());
    let runtime = Runtime::new(
        context,
        Settings::default(),
        db,
        fake_backends(Arc::new(EchoCompletion)),
    );
    (tmp, runtime)
}

fn fake_backends(completion: Arc<dyn CompletionService>) -> Backends {
    Backends {
        completion,
        embedder: Arc::new(HashEmbedder::new()),
        rasterizer: Arc::new(StaticRasterizer),
        web_search: Arc::new(CannedWebSearch::new(Vec::new())),
    }
}

/// Strip margin markers from a multi-line string (Kotlin-style `trimMargin`).
///
/// Each line is scanned for the first `|` character after optional leading
/// whitespace. Everything before and including the `|` is removed. Lines that
/// do not contain a leading `|` are dropped. Use `\|` for a literal `|`.
pub fn _trim_margin(s: &str) -> String {
    s.lines()
        .filter_map(|line| {
            line.trim_start()
                .strip_prefix('|')
                .map(|rest| rest.replace("\\|", "|"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build a margin-trimmed string with `format!`-style interpolation.
macro_rules! trim_margin {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::test_util::_trim_margin(&format!($fmt $(, $arg)*))
    };
}
pub(crate) use trim_margin;

#[cfg(test)]
mod tests {
    use super::_trim_margin;

    #[test]
    fn trim_margin_keeps_indentation_after_pipe() {
        let result = _trim_margin(
            "|[
             |  \"a\"
             |]",
        );
        assert_eq!(result, "[\n  \"a\"\n]");
    }

    #[test]
    fn trim_margin_trailing_newline_and_escapes() {
        let result = _trim_margin(
            "|a \\| b
             |",
        );
        assert_eq!(result, "a | b\n");
    }

    #[test]
    fn trim_margin_skips_lines_without_pipe() {
        let result = _trim_margin(
            "no pipe here
             |has pipe",
        );
        assert_eq!(result, "has pipe");
    }
}
