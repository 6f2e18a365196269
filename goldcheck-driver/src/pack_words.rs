// SPDX-License-Identifier: Apache-2.0

use clap::ArgMatches;

use crate::report_cli_error::report_goldcheck_error_and_exit;

/// Prints the 32-bit words of a bit-string, word 0 (least significant)
/// first.
pub fn handle_pack_words(matches: &ArgMatches) {
    let bitstring = matches.get_one::<String>("BITSTRING").unwrap();
    log::info!("handle_pack_words; width {}", bitstring.len());
    match goldcheck::bits::to_words(bitstring) {
        Ok(words) => {
            let words: Vec<String> = words.iter().map(|w| format!("0x{:08X}", w)).collect();
            println!("{}", words.join(" "));
        }
        Err(e) => report_goldcheck_error_and_exit(&e, "pack-words"),
    }
}
