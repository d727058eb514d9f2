use anyhow::Result;
use gatehouse::cli::start;

fn main() -> Result<()> {
    let action = start()?;

    action.execute()
}
