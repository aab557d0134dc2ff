//! `ferry permissions`

use colored::*;
use ferry_core::PermissionMode;

/// Print every permission mode, marking the active one
pub fn show_permissions(current: PermissionMode) {
    print!("{}", render(current));
}

fn render(current: PermissionMode) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", "Permission Modes".bold().underline()));

    let width = PermissionMode::ALL
        .iter()
        .map(|mode| mode.as_str().len())
        .max()
        .unwrap_or(0);

    for mode in PermissionMode::ALL {
        let marker = if mode == current {
            "●".green().bold()
        } else {
            " ".normal()
        };
        out.push_str(&format!(
            "  {} {:<width$}  {}\n",
            marker,
            mode.as_str().cyan(),
            mode.description(),
            width = width
        ));
    }

    out.push_str(&format!("\n{}\n", "Set the mode with any of:".bold()));
    out.push_str("  ferry --permission-mode <mode>\n");
    out.push_str("  FERRY_PERMISSION_MODE=<mode>\n");
    out.push_str("  \"permission_mode\": \"<mode>\" in the config file\n");
    out
}
