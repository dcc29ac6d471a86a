use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Command};

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory, relative to the workspace root
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = crate::workspace_root().join(args.out_dir);
    fs::create_dir_all(&out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;

    let cmd = sdcd::command();
    write_page(&out_dir, "sdcd.1", cmd.clone())?;

    // One page per subcommand: sdcd-changelog.1, sdcd-tags.1, ...
    for sub in cmd.get_subcommands() {
        let page = format!("sdcd-{}.1", sub.get_name());
        write_page(&out_dir, &page, sub.clone())?;
    }

    Ok(())
}

fn write_page(out_dir: &Path, file_name: &str, cmd: Command) -> Result<(), String> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut buffer)
        .map_err(|e| format!("render {file_name}: {e}"))?;

    let path = out_dir.join(file_name);
    fs::write(&path, buffer).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
