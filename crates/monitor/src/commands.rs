//! Comandos do operador lidos do stdin.
//!
//! ```text
//! temp=31 rpm=1050 pH=5.2   → envia setpoints (parcial)
//! status | history | help | quit
//! ```

use bioreactor_core::types::{Channel, SetpointsPatch};
use crossbeam_channel::{Receiver, bounded};
use std::io::BufRead;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Setpoints(SetpointsPatch),
    Status,
    History,
    Help,
    Quit,
}

pub const HELP: &str = "Comandos: temp=<°C> rpm=<RPM> pH=<pH> | status | history | help | quit";

/// Interpreta uma linha digitada pelo operador.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "status" | "s" => return Ok(Command::Status),
        "history" | "h" => return Ok(Command::History),
        "help" | "?" => return Ok(Command::Help),
        "quit" | "exit" | "q" => return Ok(Command::Quit),
        "" => return Err("Linha vazia".into()),
        _ => {}
    }

    let args = line.strip_prefix("set ").unwrap_or(line);
    let mut patch = SetpointsPatch::default();
    for token in args.split_whitespace() {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| format!("Esperado campo=valor, recebido {token:?}"))?;
        let channel = Channel::from_key(key).ok_or_else(|| format!("Campo desconhecido: {key}"))?;
        let value: f64 = value
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| format!("Valor inválido para {key}: {value:?}"))?;
        patch = patch.with(channel, value);
    }

    if patch.is_empty() {
        return Err(format!("Comando desconhecido: {line:?}"));
    }
    Ok(Command::Setpoints(patch))
}

/// Thread que lê linhas do stdin. O channel fecha no EOF.
pub fn spawn_stdin_thread() -> Receiver<String> {
    let (tx, rx) = bounded::<String>(16);

    let spawned = std::thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Erro ao ler stdin: {e}");
                        break;
                    }
                }
            }
        });

    if let Err(e) = spawned {
        warn!("Falha ao criar thread de comandos: {e}");
    }

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_setpoints() {
        let cmd = parse_command("rpm=1050").unwrap();
        assert_eq!(
            cmd,
            Command::Setpoints(SetpointsPatch {
                rpm: Some(1050.0),
                ..Default::default()
            })
        );
    }

    #[test]
    fn parses_multiple_fields_with_prefix() {
        let cmd = parse_command("  set temp=31.5 pH=5.2 ").unwrap();
        assert_eq!(
            cmd,
            Command::Setpoints(SetpointsPatch {
                temp: Some(31.5),
                rpm: None,
                ph: Some(5.2),
            })
        );
    }

    #[test]
    fn keywords() {
        assert_eq!(parse_command("STATUS").unwrap(), Command::Status);
        assert_eq!(parse_command("h").unwrap(), Command::History);
        assert_eq!(parse_command("quit").unwrap(), Command::Quit);
        assert_eq!(parse_command("?").unwrap(), Command::Help);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("").is_err());
        assert!(parse_command("temp").is_err());
        assert!(parse_command("flow=3").is_err());
        assert!(parse_command("temp=abc").is_err());
        assert!(parse_command("temp=NaN").is_err());
    }
}
