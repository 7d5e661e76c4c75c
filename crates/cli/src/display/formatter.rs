use gdk_launcher_core::lobby::DisplayedMessage;
use gdk_launcher_core::loader::{BuildFailure, ModuleOutcome};
use gdk_launcher_core::transcript::Direction;
use gdk_launcher_core::{CandidateOutcome, GameSummary};

pub fn format_players(min: u32, max: u32) -> String {
    if min == max {
        format!("{min} player{}", if min == 1 { "" } else { "s" })
    } else {
        format!("{min}-{max} players")
    }
}

fn outcome_icon(outcome: &CandidateOutcome) -> &'static str {
    match outcome {
        CandidateOutcome::Loaded { .. } => "✅",
        CandidateOutcome::StructurallyInvalid(_) => "⏭️ ",
        CandidateOutcome::CoolingDown { .. } => "⏳",
        CandidateOutcome::TimedOut | CandidateOutcome::Cancelled => "⌛",
        CandidateOutcome::BuildFailed { .. } | CandidateOutcome::InstantiationFailed(_) => "❌",
    }
}

pub fn print_outcomes(outcomes: &[ModuleOutcome]) {
    if outcomes.is_empty() {
        println!("   (no module directories)");
        return;
    }
    for outcome in outcomes {
        println!(
            "   {} {}: {}",
            outcome_icon(&outcome.outcome),
            outcome.name,
            outcome.outcome
        );
    }
}

pub fn print_game_list(games: &[GameSummary], selected: Option<&str>) {
    println!("🎮 Games ({})", games.len());
    println!("{}", "=".repeat(60));
    if games.is_empty() {
        println!("   No games available");
        return;
    }

    for game in games {
        let marker = if selected == Some(game.module.as_str()) {
            "▶"
        } else {
            " "
        };
        println!("{} {} {} [{}]", marker, game.name, game.version, game.module);
        if !game.description.is_empty() {
            println!("     {}", game.description);
        }

        let mut modes = Vec::new();
        if game.supports_single_player {
            modes.push("single player");
        }
        if game.supports_local_multiplayer {
            modes.push("local");
        }
        if game.supports_online_multiplayer {
            modes.push("online");
        }
        println!(
            "     👥 {} · 🎯 difficulty {}-{} · ⏱️  ~{} min · by {}",
            format_players(game.min_players, game.max_players),
            game.min_difficulty,
            game.max_difficulty,
            game.estimated_duration_minutes,
            game.author
        );
        if !modes.is_empty() {
            println!("     🕹️  {}", modes.join(", "));
        }
        if !game.required_resources.is_empty() {
            println!("     📦 needs: {}", game.required_resources.join(", "));
        }
    }
}

/// Printed on stderr so `--json` output stays parseable
pub fn print_compilation_failures(failures: &[BuildFailure]) {
    for failure in failures {
        eprintln!(
            "❌ Module '{}' failed to build (exit code {:?})",
            failure.module, failure.exit_code
        );
        for line in &failure.summary {
            eprintln!("   {line}");
        }
    }
}

pub fn print_displayed_message(message: &DisplayedMessage) {
    let arrow = match message.direction {
        Direction::ToGame => "→",
        Direction::FromGame => "←",
    };
    let body = serde_json::to_string(&message.message).unwrap_or_default();
    println!("{arrow} {body}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_players() {
        assert_eq!(format_players(1, 1), "1 player");
        assert_eq!(format_players(2, 2), "2 players");
        assert_eq!(format_players(2, 4), "2-4 players");
    }
}
