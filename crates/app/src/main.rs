use std::io::Write as _;
use std::path::Path;

use reels_core::model::{Difficulty, QuestionId, Rating, ReviewCard, mastery_color, mastery_label};
use reels_core::scheduler::{Scheduler, format_interval};
use services::{ReviewSession, SrsService};
use storage::repository::SrsRepository;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;

use cli::{Command, Invocation, Parsed, ResetTarget};
use config::EnvOverrides;

/// Channel used for cards first seen through `review` without `--channel`.
const DEFAULT_CHANNEL: &str = "general";

fn parse_question(
    raw_id: &str,
    raw_difficulty: Option<&str>,
) -> Result<(QuestionId, Difficulty), reels_core::Error> {
    let question_id: QuestionId = raw_id.parse()?;
    let difficulty = raw_difficulty
        .map(str::parse::<Difficulty>)
        .transpose()?
        .unwrap_or_default();
    Ok((question_id, difficulty))
}

/// Make sure the parent directory (and file) of a file-backed SQLite URL exist.
fn prepare_sqlite_file(db_url: &str) -> std::io::Result<()> {
    let Some(rest) = db_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.starts_with(":memory:") || path.starts_with("file:") {
        return Ok(());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

async fn build_service(invocation: &Invocation) -> Result<SrsService, Box<dyn std::error::Error>> {
    let settings = config::load(
        invocation.config_path.as_deref(),
        invocation.db_url.clone(),
        EnvOverrides::from_env(),
    )?;
    let scheduler = Scheduler::try_with_config(settings.scheduler.clone())
        .map_err(reels_core::Error::from)?;

    prepare_sqlite_file(&settings.db_url)?;
    let repo = SrsRepository::sqlite(&settings.db_url).await?;

    let mut service = SrsService::new(repo).with_scheduler(scheduler);
    if let Some(offset) = settings.utc_offset {
        service = service.with_utc_offset(offset);
    }
    Ok(service)
}

fn print_card_line(card: &ReviewCard) {
    println!(
        "{:<24} {:<12} {:<11} due {}",
        card.question_id().as_str(),
        card.channel(),
        card.mastery_level().label(),
        card.due_at().format("%Y-%m-%d %H:%M UTC"),
    );
}

async fn run_session(
    service: &SrsService,
    mut session: ReviewSession,
) -> Result<(), Box<dyn std::error::Error>> {
    if session.is_empty() {
        println!("Nothing due. Come back later.");
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(card) = session.current() {
        let preview = service.get_next_review_preview(card);
        println!(
            "[{}/{}] {} ({}, {})",
            session.answered() + 1,
            session.len(),
            card.question_id(),
            card.channel(),
            card.mastery_level(),
        );
        println!(
            "  again: {} | hard: {} | good: {} | easy: {}",
            preview.again.label, preview.hard.label, preview.good.label, preview.easy.label
        );
        print!("rating (again/hard/good/easy, q to stop)> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            break;
        }
        let rating: Rating = match line.parse() {
            Ok(rating) => rating,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };

        let answer = service.answer_current(&mut session, rating).await?;
        println!(
            "  next review in {}",
            format_interval(answer.recorded.card.interval_days())
        );
        if let Some(summary) = answer.summary {
            let counts = summary.counts();
            println!(
                "Session complete: {} reviews (again {}, hard {}, good {}, easy {}).",
                summary.total_reviews(),
                counts.again,
                counts.hard,
                counts.good,
                counts.easy
            );
            if let Some(rate) = counts.recall_rate() {
                println!("Recalled {:.0}% without a lapse.", rate * 100.0);
            }
        }
    }

    if !session.is_complete() {
        println!(
            "Stopped with {} card(s) left; they stay due.",
            session.remaining()
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let invocation = match cli::parse(std::env::args().skip(1)) {
        Ok(Parsed::Run(invocation)) => invocation,
        Ok(Parsed::Help) => {
            cli::print_usage();
            return Ok(());
        }
        Err(err) => {
            eprintln!("{err}");
            cli::print_usage();
            return Err(err.into());
        }
    };

    let service = build_service(&invocation).await?;

    match invocation.command {
        Command::Due { channel } => {
            let due = match channel.as_deref() {
                Some(channel) => service.get_due_cards_in_channel(channel).await?,
                None => service.get_due_cards().await?,
            };
            if due.is_empty() {
                println!("Nothing due.");
            }
            for card in &due {
                print_card_line(card);
            }
        }
        Command::Mark {
            question_id,
            channel,
            difficulty,
        } => {
            let (question_id, difficulty) = parse_question(&question_id, difficulty.as_deref())?;
            let card = service
                .mark_for_review(&question_id, &channel, difficulty)
                .await?;
            print_card_line(&card);
        }
        Command::Review {
            question_id,
            rating,
            channel,
            difficulty,
        } => {
            let (question_id, difficulty) = parse_question(&question_id, difficulty.as_deref())?;
            let channel = channel.as_deref().unwrap_or(DEFAULT_CHANNEL);
            let recorded = service
                .record_review_input(&question_id, channel, difficulty, &rating)
                .await?;
            println!(
                "{}: rated {}, next review in {} ({})",
                question_id,
                recorded.applied.scheduled.rating,
                format_interval(recorded.card.interval_days()),
                recorded.applied.due_at.format("%Y-%m-%d"),
            );
            println!("Review streak: {} day(s)", recorded.review_streak);
        }
        Command::Preview { question_id } => {
            let (question_id, _) = parse_question(&question_id, None)?;
            let Some(card) = service.get_card(&question_id).await? else {
                return Err(format!("{question_id} is not in review").into());
            };
            let preview = service.get_next_review_preview(&card);
            for rating in Rating::ALL {
                println!("{:<6} {}", rating.as_str(), preview.get(rating).label);
            }
        }
        Command::Stats => {
            let stats = service.get_srs_stats().await?;
            println!("Cards:          {}", stats.total_cards);
            println!("Due now:        {}", stats.due_today);
            println!("New:            {}", stats.new_cards);
            println!("Mastered:       {}", stats.mastered_cards);
            println!("Reviewed today: {}", stats.reviewed_today);
            println!(
                "Streak:         {} (longest {})",
                stats.review_streak, stats.longest_streak
            );
            for (tier, count) in stats.by_mastery.iter().enumerate() {
                let tier = u8::try_from(tier).unwrap_or(u8::MAX);
                println!(
                    "  {:<11} {:>5}  [{}]",
                    mastery_label(tier),
                    count,
                    mastery_color(tier).as_str()
                );
            }
        }
        Command::Reset(ResetTarget::One(question_id)) => {
            let (question_id, _) = parse_question(&question_id, None)?;
            if service.reset_card(&question_id).await? {
                println!("Reset {question_id}.");
            } else {
                println!("{question_id} had no review progress.");
            }
        }
        Command::Reset(ResetTarget::All) => {
            let removed = service.reset_all().await?;
            println!("Removed {removed} card(s) and the review streak.");
        }
        Command::Session { channel } => {
            let session = match channel.as_deref() {
                Some(channel) => service.start_session_in_channel(channel).await?,
                None => service.start_session().await?,
            };
            run_session(&service, session).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // `.env` may carry RUST_LOG, so load it before the subscriber.
    let _ = dotenvy::dotenv();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_arguments_are_validated() {
        let (id, difficulty) = parse_question("react-1", None).unwrap();
        assert_eq!(id.as_str(), "react-1");
        assert_eq!(difficulty, Difficulty::Intermediate);

        let (_, difficulty) = parse_question("q", Some("advanced")).unwrap();
        assert_eq!(difficulty, Difficulty::Advanced);

        assert!(matches!(
            parse_question("  ", None),
            Err(reels_core::Error::InvalidQuestionId(_))
        ));
        assert!(matches!(
            parse_question("q", Some("expert")),
            Err(reels_core::Error::InvalidDifficulty(_))
        ));
    }

    #[test]
    fn memory_urls_need_no_file() {
        prepare_sqlite_file("sqlite::memory:").unwrap();
        prepare_sqlite_file("sqlite:file:shared?mode=memory&cache=shared").unwrap();
    }

    #[test]
    fn file_urls_get_parent_directories() {
        let dir = std::env::temp_dir().join("reels-prepare-sqlite-test");
        let _ = std::fs::remove_dir_all(&dir);
        let db = dir.join("nested").join("reels.sqlite3");

        prepare_sqlite_file(&format!("sqlite:{}?mode=rwc", db.display())).unwrap();
        assert!(db.exists());
    }
}
