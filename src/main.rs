#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    neuronfield::init_logging()?;
    let config = neuronfield::FieldConfig::from_env()?;
    neuronfield::run(config)
}

// The browser build starts from `run_web` instead.
#[cfg(target_arch = "wasm32")]
fn main() {}
