use anyhow::Result;

fn main() -> Result<()> {
    tusweep_core::run()
}
