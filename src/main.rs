use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::Context;
use clap::{arg, command, value_parser, ArgAction, ArgMatches};
use renfa::*;

fn cli() -> clap::Command {
    command!()
        .about("Compiles regular expressions into NFAs")
        .arg(arg!([REGEX] ... "Regexes to compile; read from stdin, one per line, if none"))
        .arg(
            arg!(-C --config <CONFIG_FILE> "JSON file with compilation settings")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(arg!(-a --alphabet <CHARS> "Symbols the automaton is declared over"))
        .arg(arg!(-s --strict "Reject unbalanced parentheses").action(ArgAction::SetTrue))
        .arg(arg!(-j --json "Print a JSON report per regex").action(ArgAction::SetTrue))
        .arg(arg!(-p --pretty "Indent JSON output").action(ArgAction::SetTrue))
}

fn load_config(args: &ArgMatches) -> anyhow::Result<Config> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => {
            let src = fs::read_to_string(path)
                .with_context(|| format!("can not read `{}`", path.display()))?;
            Config::from_json(&src)
                .with_context(|| format!("invalid config file `{}`", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(chars) = args.get_one::<String>("alphabet") {
        config = config.with_alphabet(chars.chars().filter(|c| !c.is_whitespace()));
    }
    if args.get_flag("strict") {
        config = config.with_strict_parens(true);
    }
    Ok(config)
}

fn show(regex: &str, config: &Config, json: bool, pretty: bool) -> Result<(), Error> {
    let compiled = compile_nfa(regex, config)?;
    if json {
        let report = compiled.report();
        let out = if pretty { report.to_json_pretty()? } else { report.to_json()? };
        println!("{}", out);
        return Ok(());
    }
    println!("Original regex: {:?}", compiled.regex);
    println!("With concatenation: {:?}", add_concatenation(&compiled.regex));
    println!("Postfix: {}", regex::postfix_string(&compiled.postfix));
    print!("{}", compiled.nfa);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = cli().get_matches();
    let config = load_config(&args)?;
    let json = args.get_flag("json");
    let pretty = args.get_flag("pretty");

    let regexes: Vec<String> = match args.get_many::<String>("REGEX") {
        Some(values) => values.cloned().collect(),
        None => Vec::new(),
    };

    if !regexes.is_empty() {
        for regex in &regexes {
            if let Err(e) = show(regex, &config, json, pretty) {
                eprintln!("error: {}", e);
            }
        }
        return Ok(());
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("can not read from stdin")?;
        if let Err(e) = show(&line, &config, json, pretty) {
            eprintln!("error: {}", e);
        }
    }
    Ok(())
}
