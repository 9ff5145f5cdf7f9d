//! Терминальный интерфейс pero — спиннер и цветная сводка запуска.
//!
//! Использует `indicatif` для спиннера и `console` для стилизации.
//! [`RunProgress`] визуально сопровождает одну активацию оркестратора.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::orchestrator::RunOutcome;
use crate::sheets::RowStatus;

/// Индикатор выполнения одной активации в терминале.
pub struct RunProgress {
    // Спиннер indicatif.
    pb: ProgressBar,
    // Зелёный стиль для успешных строк.
    green: Style,
    // Красный стиль для ошибок.
    red: Style,
    // Жёлтый стиль для непромодерированных строк.
    yellow: Style,
}

impl RunProgress {
    /// Запустить спиннер с поясняющим сообщением.
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Остановить спиннер и вывести сводку по обработанным строкам.
    pub fn finish(&self, outcomes: &[RunOutcome]) {
        self.pb.finish_and_clear();
        if outcomes.is_empty() {
            println!("  No prepared rows to process");
            return;
        }
        for outcome in outcomes {
            match outcome {
                RunOutcome::Completed {
                    row,
                    status: RowStatus::Written,
                } => {
                    println!("  {} row {row}: Written", self.green.apply_to("✓"));
                }
                RunOutcome::Completed { row, status } => {
                    println!(
                        "  {} row {row}: {status}",
                        self.yellow.apply_to("▲")
                    );
                }
                RunOutcome::Failed { row, reason } => {
                    println!("  {} row {row}: {reason}", self.red.apply_to("✗"));
                }
                RunOutcome::Idle => {}
            }
        }
        println!("  {} row(s) processed", outcomes.len());
    }

    /// Остановить спиннер и вывести ошибку запуска.
    pub fn fail(&self, error: &dyn std::fmt::Display) {
        self.pb.finish_and_clear();
        println!("  {} run failed: {error}", self.red.apply_to("✗"));
    }
}
