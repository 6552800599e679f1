// SPDX-License-Identifier: Apache-2.0

use colored::Colorize;

/// Exit status for errors that stop a run before the search.
pub const EXIT_INIT_ERROR: i32 = 2;

pub fn report_cli_error_and_exit(message: &str, details: Vec<(&str, &str)>) -> ! {
    eprintln!("mutrepair-driver: {}", message.red().bold());
    for (key, value) in details {
        eprintln!("  {}: {}", key, value);
    }
    std::process::exit(EXIT_INIT_ERROR);
}
