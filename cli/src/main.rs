mod args;
mod logging;

use std::io::{self, BufRead};
use std::process::ExitCode;

use clap::Parser;
use redis_facade::{Connection, Driver, RedisFacadeError, Value};

use crate::args::{Args, CliConfig, parse_line};
use crate::logging::LogWriter;

fn main() -> ExitCode {
    let args = Args::parse();
    let config = match CliConfig::from_args(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid arguments: {err}");
            return ExitCode::from(2);
        }
    };
    let writer = LogWriter::new(config.log.clone()).unwrap_or_else(|err| {
        eprintln!("failed to open log file: {err}");
        std::process::exit(1);
    });
    logging::init(writer, config.log_queries);

    let config_json = serde_json::to_string(&config).unwrap_or_else(|_| "{}".to_string());
    tracing::debug!("config: {}", config_json);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &CliConfig) -> Result<(), RedisFacadeError> {
    let mut conn = Connection::new(config.connection_options());

    if let Some((command, rest)) = config.command.split_first() {
        let args: Vec<Value> = rest.iter().map(|word| Value::from(word.as_str())).collect();
        return execute(&mut conn, config.transaction, vec![(command.clone(), args)]);
    }

    if config.transaction {
        let commands = read_commands(io::stdin().lock())?;
        return execute(&mut conn, true, commands);
    }

    // one reply per input line; errors are reported and the loop continues
    for line in io::stdin().lock().lines() {
        let line = line.map_err(stdin_error)?;
        let Some((command, args)) = parse_line(&line) else {
            continue;
        };
        match conn.invoke(&command, &args) {
            Ok(reply) => println!("{reply}"),
            Err(err) => eprintln!("(error) {err}"),
        }
    }
    Ok(())
}

fn execute(
    conn: &mut Connection,
    transaction: bool,
    commands: Vec<(String, Vec<Value>)>,
) -> Result<(), RedisFacadeError> {
    if transaction {
        let reply = conn.transaction(|tx: &mut dyn Driver| {
            for (command, args) in &commands {
                tx.invoke(command, args)?;
            }
            Ok(())
        })?;
        println!("{reply}");
        return Ok(());
    }
    for (command, args) in &commands {
        println!("{}", conn.invoke(command, args)?);
    }
    Ok(())
}

fn read_commands(input: impl BufRead) -> Result<Vec<(String, Vec<Value>)>, RedisFacadeError> {
    let mut commands = Vec::new();
    for line in input.lines() {
        if let Some(command) = parse_line(&line.map_err(stdin_error)?) {
            commands.push(command);
        }
    }
    Ok(commands)
}

fn stdin_error(err: io::Error) -> RedisFacadeError {
    RedisFacadeError::Other(format!("reading stdin: {err}"))
}
