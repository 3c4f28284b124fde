use color_eyre::Result;

pub fn init_errors() -> Result<()> {
    color_eyre::config::HookBuilder::default()
        .capture_span_trace_by_default(true)
        .install()
}
