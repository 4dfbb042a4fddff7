use vsem::ir::SourceSpan;

/// A throwaway source span — these tests care about diagnostic messages
/// and IR shape, never about the rendered location text itself.
pub fn span(line: u32) -> SourceSpan {
    SourceSpan::new("test.vsem", line, 1)
}

/// Install a `tracing` subscriber writing through the test harness's
/// captured output, so the driver's per-block/per-repair trace lines
/// (`vsem::di::driver`, `vsem::di::transfer`) show up under `--nocapture`
/// instead of going nowhere. Safe to call from every test: `try_init`
/// no-ops once a global subscriber is already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).try_init();
}
