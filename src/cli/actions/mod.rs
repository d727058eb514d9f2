pub mod check;
pub mod hash;
pub mod keys;

mod run;

#[derive(Debug)]
pub enum Action {
    Paseto(keys::PasetoArgs),
    Secret(keys::SecretArgs),
    Hash(hash::HashArgs),
    DigestPassword(hash::DigestArgs),
    Check(check::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub fn execute(self) -> anyhow::Result<()> {
        run::execute(self)
    }
}
