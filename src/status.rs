//! Display packager process status

use crate::error::Result;
use crate::packager::{Packager, ProcessInfo};
use std::io::Write;
use std::path::Path;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Print the packager processes for `project_dir`, or all managed processes.
pub async fn show_status(packager: &dyn Packager, project_dir: &Path, all: bool) -> Result<()> {
    let processes = packager.status(project_dir, all).await?;

    let bufwtr = BufferWriter::stdout(ColorChoice::Auto);
    let mut buffer = bufwtr.buffer();
    render_status(&mut buffer, &processes, project_dir, all);
    let _ = bufwtr.print(&buffer);

    Ok(())
}

/// Write a status listing; output errors are ignored like all decorative output.
pub fn render_status<W: WriteColor>(
    out: &mut W,
    processes: &[ProcessInfo],
    project_dir: &Path,
    all: bool,
) {
    if all {
        let _ = writeln!(out, "📋 Managed packager processes\n");
    } else {
        let _ = writeln!(out, "📋 Packager status for {}\n", project_dir.display());
    }

    if processes.is_empty() {
        let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
        let _ = writeln!(out, "⚠️  No packager processes found");
        let _ = out.reset();
        return;
    }

    for process in processes {
        if process.is_running() {
            let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
            let _ = write!(out, "✅ {}", process.name);
        } else {
            let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
            let _ = write!(out, "❌ {}", process.name);
        }
        let _ = out.reset();
        let _ = writeln!(out, ": {}", process.status);

        if let Some(pid) = process.pid {
            let _ = writeln!(out, "   PID: {pid}");
        }
        if let Some(port) = process.port {
            let _ = writeln!(out, "   Port: {port}");
        }
        if all && let Some(dir) = &process.project_dir {
            let _ = writeln!(out, "   Project: {}", dir.display());
        }
    }
}
