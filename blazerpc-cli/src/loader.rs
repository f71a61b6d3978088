//! Resolves an `<app-ref>` string (`module:attribute`) to an `App`.
//!
//! The original loader (`original_source/src/blazerpc/cli/serve.py`)
//! dynamically imports a Python module and pulls an attribute off it.
//! There's no equivalent in Rust without a dynamic-loading dependency the
//! rest of this stack has no other use for, so known app-refs are resolved
//! against a small static table instead — this binary is only a reference
//! front-end (the spec treats the CLI as an external collaborator), and the
//! table still enforces the same `module:attribute` format and the same
//! `ConfigurationError` failure modes a real loader would hit.

use blazerpc_core::{App, BlazeError};

type Builder = fn() -> App;

const KNOWN_APPS: &[(&str, Builder)] = &[("blazerpc_demo:app", blazerpc_demo::app)];

pub fn load_app(app_ref: &str) -> Result<App, BlazeError> {
    let Some((module_path, attr_name)) = app_ref.split_once(':') else {
        return Err(BlazeError::Configuration(format!(
            "invalid import string '{app_ref}'. Expected format: 'module:attribute' (e.g. 'app:app')"
        )));
    };
    if module_path.is_empty() || attr_name.is_empty() {
        return Err(BlazeError::Configuration(format!(
            "invalid import string '{app_ref}'. Expected format: 'module:attribute' (e.g. 'app:app')"
        )));
    }

    KNOWN_APPS
        .iter()
        .find(|(known, _)| *known == app_ref)
        .map(|(_, builder)| builder())
        .ok_or_else(|| {
            BlazeError::Configuration(format!(
                "could not import module '{module_path}': no application is registered under '{app_ref}'"
            ))
        })
}
