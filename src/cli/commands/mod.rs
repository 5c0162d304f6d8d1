pub mod authenticator;
pub mod console;
pub mod csrf;
pub mod logging;
pub mod session;

use clap::{
    Arg, ColorChoice, Command,
    builder::{
        ValueParser,
        styling::{AnsiColor, Effects, Styles},
    },
};
use regex::Regex;

// RFC 6265 cookie-name (RFC 7230 token).
const COOKIE_NAME_PATTERN: &str = r"^[!#$%&'*+\-.^_`|~0-9A-Za-z]+$";

#[must_use]
pub fn validator_cookie_name() -> ValueParser {
    ValueParser::from(move |name: &str| -> std::result::Result<String, String> {
        let re = Regex::new(COOKIE_NAME_PATTERN).map_err(|e| e.to_string())?;
        if re.is_match(name) {
            Ok(name.to_string())
        } else {
            Err(format!("invalid cookie name: {name}"))
        }
    })
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("sentinel")
        .about("Session, authentication and CSRF gateway for operations consoles")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("SENTINEL_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = console::with_args(command);
    let command = session::with_args(command);
    let command = csrf::with_args(command);
    let command = authenticator::with_args(command);
    logging::with_args(command)
}
