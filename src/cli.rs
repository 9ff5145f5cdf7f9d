//! Интерфейс командной строки pero на базе clap.
//!
//! Определяет структуру [`Cli`] с подкомандами [`Command`] (run, check)
//! и глобальным флагом `--verbose`.

use clap::{Parser, Subcommand};

/// pero — оркестратор контент-пайплайна поверх общей таблицы.
#[derive(Debug, Parser)]
#[command(name = "pero", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Подробный вывод (уровень debug).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Обработать очередные подготовленные строки (точка входа для cron).
    Run {
        /// Ограничиться одной вкладкой из конфигурации.
        #[arg(long)]
        tab: Option<String>,
    },

    /// Проверить конфигурацию и заголовки вкладок, ничего не обрабатывая.
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["pero", "run"]);
        match cli.command {
            Command::Run { tab } => assert!(tab.is_none()),
            _ => panic!("expected Run command"),
        }
        assert!(!cli.verbose);
    }

    #[test]
    fn cli_parses_run_with_tab_filter() {
        let cli = Cli::parse_from(["pero", "run", "--tab", "Блог"]);
        match cli.command {
            Command::Run { tab } => assert_eq!(tab.as_deref(), Some("Блог")),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_verbose_flag() {
        let cli = Cli::parse_from(["pero", "--verbose", "check"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Check));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
