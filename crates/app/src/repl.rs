use std::error::Error;
use std::io::Write;

use quiz_core::model::Direction;
use services::{
    ControllerError, FinalResult, FinalizeOutcome, LeaderboardView, QuizSessionController,
    SkipReason, VerdictSource,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

const LEADERBOARD_ROWS: u32 = 20;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Navigate(Direction),
    Finish,
    Reset,
    Board,
    Help,
    Quit,
    Answer(String),
    Blank,
}

impl Input {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Self::Blank,
            ":next" | ":n" => Self::Navigate(Direction::Next),
            ":prev" | ":p" => Self::Navigate(Direction::Previous),
            ":finish" | ":f" => Self::Finish,
            ":reset" => Self::Reset,
            ":board" | ":b" => Self::Board,
            ":help" | ":h" | ":?" => Self::Help,
            ":quit" | ":q" => Self::Quit,
            _ => Self::Answer(line.to_owned()),
        }
    }
}

fn print_help() {
    println!("Type an answer and press enter to submit it.");
    println!("  :next / :prev   move between questions");
    println!("  :finish         finish now and show the verdict");
    println!("  :reset          clear your answers (keeps your session)");
    println!("  :board          show the leaderboard");
    println!("  :quit           leave");
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

type StdinLines = Lines<BufReader<Stdin>>;

async fn ask(lines: &mut StdinLines, text: &str) -> Result<Option<String>, Box<dyn Error>> {
    prompt(text);
    Ok(lines.next_line().await?)
}

/// Interactive quiz loop on stdin/stdout until `:quit` or end of input.
pub(crate) async fn play(
    quiz: &mut QuizSessionController,
    board: &mut LeaderboardView,
) -> Result<(), Box<dyn Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let summary = quiz.reload().await?;
    println!(
        "Quiz \"{}\": {} questions, {} correct answers needed to pass.",
        quiz.identity().quiz_id(),
        summary.question_count,
        quiz.pass_threshold()
    );
    if summary.threshold_fallback {
        println!("(could not fetch quiz settings; using the last known pass score)");
    }
    if summary.stats.answered > 0 {
        println!(
            "Welcome back: {} of {} answered.",
            summary.stats.answered, summary.stats.total
        );
    }

    if !establish_session(quiz, &mut lines).await? {
        return Ok(());
    }
    if let Some(result) = quiz.displayed_verdict() {
        render_verdict(result);
    }
    print_help();
    show_current(quiz);

    while let Some(line) = ask(&mut lines, "> ").await? {
        match Input::parse(&line) {
            Input::Blank => {}
            Input::Quit => break,
            Input::Help => print_help(),
            Input::Navigate(direction) => match quiz.navigate(direction).await {
                Ok(_) => show_current(quiz),
                Err(err) => report(&err),
            },
            Input::Finish => match quiz.finalize(true).await {
                Ok(outcome) => render_outcome(&outcome),
                Err(err) => report(&err),
            },
            Input::Reset => match quiz.reset_progress().await {
                Ok(()) => {
                    println!("Progress cleared.");
                    show_current(quiz);
                }
                Err(err) => report(&err),
            },
            Input::Board => println!("{}", board.refresh(LEADERBOARD_ROWS).await),
            Input::Answer(text) => submit(quiz, &text).await,
        }
    }
    Ok(())
}

/// Returns false when input ends before a session exists.
async fn establish_session(
    quiz: &mut QuizSessionController,
    lines: &mut StdinLines,
) -> Result<bool, Box<dyn Error>> {
    if let Some(profile) = quiz.profile() {
        println!("Playing as {}.", profile.nickname());
        return Ok(true);
    }

    loop {
        let Some(nickname) = ask(lines, "Nickname (empty to play as guest): ").await? else {
            return Ok(false);
        };
        let Some(visible) = ask(lines, "Show you in the leaderboard? [y/N]: ").await? else {
            return Ok(false);
        };
        let visible = matches!(visible.trim().to_lowercase().as_str(), "y" | "yes");

        match quiz.start_session(&nickname, visible).await {
            Ok(profile) => {
                println!("Playing as {}.", profile.nickname());
                return Ok(true);
            }
            Err(err) => report(&err),
        }
    }
}

async fn submit(quiz: &mut QuizSessionController, text: &str) {
    match quiz.submit_answer(text).await {
        Ok(outcome) => {
            let mark = if outcome.correct { "correct" } else { "not quite" };
            println!("[{mark}] {}", outcome.feedback);
            println!(
                "Progress: {}/{} answered, {} correct.",
                outcome.stats.answered, outcome.stats.total, outcome.stats.correct
            );
        }
        Err(err) => {
            report(&err);
            return;
        }
    }

    match quiz.finalize(false).await {
        Ok(outcome @ FinalizeOutcome::Finished(_)) => render_outcome(&outcome),
        Ok(FinalizeOutcome::Skipped(_)) => {
            if quiz.navigate(Direction::Next).await.is_ok() {
                show_current(quiz);
            }
        }
        Err(err) => report(&err),
    }
}

fn show_current(quiz: &QuizSessionController) {
    let (Some(index), Some(question)) = (quiz.current_index(), quiz.current_question()) else {
        println!("This quiz has no questions.");
        return;
    };
    println!();
    println!(
        "Question {}/{}: {}",
        index + 1,
        quiz.questions().len(),
        question.prompt()
    );
    if let Some(record) = quiz.current_answer() {
        let mark = if record.verdict { "correct" } else { "not quite" };
        println!("  your answer: {} [{mark}]", record.raw_answer);
    }
}

fn render_outcome(outcome: &FinalizeOutcome) {
    match outcome {
        FinalizeOutcome::Finished(result) => render_verdict(result),
        FinalizeOutcome::Skipped(SkipReason::NoQuestions) => {
            println!("Nothing to finish: the quiz has no questions.");
        }
        FinalizeOutcome::Skipped(SkipReason::Incomplete { answered, total }) => {
            println!("{answered} of {total} answered so far.");
        }
    }
}

fn render_verdict(result: &FinalResult) {
    let verdict = &result.verdict;
    let headline = if verdict.passed { "PASSED" } else { "NOT PASSED" };
    println!();
    println!(
        "== {headline}: {}/{} correct ({} answered) ==",
        verdict.correct(),
        verdict.total(),
        verdict.answered()
    );
    println!("{}", verdict.message);
    if result.source == VerdictSource::Fallback {
        println!("(offline verdict; finish again later for full feedback)");
    }
}

fn report(err: &ControllerError) {
    if !err.is_validation() {
        tracing::debug!(error = ?err, "Operation failed");
    }
    println!("! {err}");
}
