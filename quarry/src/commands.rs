use crate::CLAP_STYLING;
use clap::{Arg, arg, command};
use std::path::PathBuf;
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("quarry")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("quarry")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log crawl and probe activity to stderr")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl a host from its root, harvesting endpoints from links, forms and \
                script references. Never leaves the target host.",
                )
                .arg(target_arg())
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("Maximum crawl depth (default: 2)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-t --"threads" <NUM_FETCHES>)
                        .required(false)
                        .help("Maximum concurrent page fetches (default: 10)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .args(shared_args()),
        )
        .subcommand(
            command!("fuzz")
                .about(
                    "Actively probe a host with every wordlist path and HTTP method \
                combination, using a pool of async workers.",
                )
                .arg(target_arg())
                .arg(
                    arg!(-w --"wordlist-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited wordlist (default: built-in common list)")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("builtin"),
                )
                .arg(
                    arg!(-b --"builtin" <NAME>)
                        .required(false)
                        .help("Built-in wordlist to use")
                        .value_parser(["common", "api", "admin", "auth"]),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of async workers in the pool (default: 5)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-m --"methods" <METHODS>)
                        .required(false)
                        .help("Comma-separated HTTP methods to test")
                        .default_value("GET,POST,PUT,DELETE"),
                )
                .arg(
                    arg!(--"delay" <MILLISECONDS>)
                        .required(false)
                        .help("Delay each worker waits after every request")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("0"),
                )
                .arg(
                    arg!(--"discover")
                        .required(false)
                        .help("Crawl the target before probing it")
                        .action(clap::ArgAction::SetTrue),
                )
                .args(shared_args()),
        )
}

fn target_arg() -> Arg {
    arg!(-u --"url" <URL>)
        .required(true)
        .help("The base URL of the target")
        .value_parser(clap::value_parser!(Url))
}

/// Transport and output flags common to every subcommand
fn shared_args() -> Vec<Arg> {
    vec![
        arg!(-c --"config" <PATH>)
            .required(false)
            .help("JSON config file; flags given on the command line take precedence")
            .value_parser(clap::value_parser!(PathBuf)),
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Request timeout in seconds (default: 10)")
            .value_parser(clap::value_parser!(u64)),
        arg!(--"user-agent" <AGENT>)
            .required(false)
            .help("User-Agent sent with every request"),
        arg!(--"max-redirects" <NUM>)
            .required(false)
            .help("Redirects followed before the redirect itself is reported (default: 3)")
            .value_parser(clap::value_parser!(usize)),
        arg!(-p --"proxies" <PATH>)
            .required(false)
            .help("Newline-delimited list of proxy URLs")
            .value_parser(clap::value_parser!(PathBuf)),
        arg!(--"no-rotate")
            .required(false)
            .help("Keep using the first proxy when requests fail")
            .action(clap::ArgAction::SetTrue),
        arg!(-k --"insecure")
            .required(false)
            .help("Accept invalid TLS certificates")
            .action(clap::ArgAction::SetTrue),
        arg!(-H --"header" <HEADER>)
            .required(false)
            .help("Extra request header as 'Name: value' (repeatable)")
            .action(clap::ArgAction::Append),
        arg!(--"cookie" <COOKIE>)
            .required(false)
            .help("Cookie as 'name=value' (repeatable)")
            .action(clap::ArgAction::Append),
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Save report to file (default: display to screen)")
            .value_parser(clap::value_parser!(PathBuf)),
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Report format: text, json, markdown")
            .value_parser(["text", "txt", "json", "markdown", "md"])
            .default_value("text"),
    ]
}
