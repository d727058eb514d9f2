use crate::cli::actions::{check, hash, keys, Action};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub fn execute(action: Action) -> Result<()> {
    match action {
        Action::Paseto(args) => keys::paseto(&args),
        Action::Secret(args) => keys::secret(&args),
        Action::Hash(args) => hash::password(&args),
        Action::DigestPassword(args) => hash::digest(&args),
        Action::Check(args) => check::execute(&args),
    }
}
