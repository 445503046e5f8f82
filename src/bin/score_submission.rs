use anyhow::{bail, Context, Result};
use pitch_scorer::embedding::EmbeddingHandle;
use pitch_scorer::evaluation::{evaluate_submission, SubmissionJob};
use pitch_scorer::scoring::{Challenge, Criterion};
use pitch_scorer::settings::{settings, Settings};
use pitch_scorer::utils::{log_error, print_report};
use std::env;
use std::process;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    eprintln!("Usage: score-submission <job.json>");
    eprintln!("       score-submission --criteria <pairs> [options] <transcript...>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <job.json>          Submission job file, as dropped into the worker inbox");
    eprintln!("  <transcript>        Raw transcript text to score");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --criteria <pairs>  Comma-separated keyword:weight pairs");
    eprintln!("                      e.g. \"discount:3,scam:-4\"");
    eprintln!("  --ideal <text>      Ideal pitch to compare the transcript against");
    eprintln!("  --duration <secs>   Recording duration, enables pause estimates");
}

#[derive(Debug, Default, PartialEq)]
struct AdHocArgs {
    criteria: Vec<(String, i32)>,
    ideal_pitch: Option<String>,
    duration: Option<f64>,
    transcript: String,
}

enum Input {
    JobFile(String),
    AdHoc(AdHocArgs),
}

fn parse_criteria(pairs: &str) -> Result<Vec<(String, i32)>> {
    pairs
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (keyword, weight) = pair
                .rsplit_once(':')
                .with_context(|| format!("criterion {pair:?} is missing a :weight"))?;
            let weight = weight
                .trim()
                .parse::<i32>()
                .with_context(|| format!("criterion {pair:?} has an invalid weight"))?;
            Ok((keyword.trim().to_string(), weight))
        })
        .collect()
}

fn parse_args(args: &[String]) -> Result<Input> {
    if let [path] = args {
        if path.ends_with(".json") {
            return Ok(Input::JobFile(path.clone()));
        }
    }

    let mut parsed = AdHocArgs::default();
    let mut words = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--criteria" | "-c" => {
                let pairs = iter.next().context("--criteria needs a value")?;
                parsed.criteria.extend(parse_criteria(pairs)?);
            }
            "--ideal" | "-i" => {
                parsed.ideal_pitch = Some(iter.next().context("--ideal needs a value")?.clone());
            }
            "--duration" | "-d" => {
                let secs = iter.next().context("--duration needs a value")?;
                parsed.duration = Some(secs.parse().context("--duration must be a number")?);
            }
            _ => words.push(arg.as_str()),
        }
    }

    parsed.transcript = words.join(" ");
    if parsed.transcript.trim().is_empty() {
        bail!("no transcript given");
    }
    Ok(Input::AdHoc(parsed))
}

async fn load_job(path: &str, embeddings: &EmbeddingHandle, s: &Settings) -> Result<SubmissionJob> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let mut job: SubmissionJob =
        serde_json::from_str(&contents).with_context(|| format!("failed to parse {path}"))?;

    for criterion in job.criteria.iter_mut().filter(|c| !c.has_embedding()) {
        let keyword = criterion.keyword().to_string();
        criterion
            .edit(Some(keyword.as_str()), None, embeddings, s.scoring.max_criterion_weight)
            .await?;
    }
    Ok(job)
}

async fn build_job(
    args: AdHocArgs,
    embeddings: &EmbeddingHandle,
    s: &Settings,
) -> Result<SubmissionJob> {
    let mut challenge = Challenge::default();
    for (keyword, weight) in &args.criteria {
        let criterion =
            Criterion::create(keyword, *weight, embeddings, s.scoring.max_criterion_weight).await?;
        challenge.criteria.push(criterion);
    }
    challenge
        .set_ideal_pitch(args.ideal_pitch.as_deref(), embeddings)
        .await?;

    Ok(SubmissionJob {
        submission_id: "ad-hoc".to_string(),
        transcript: args.transcript,
        criteria: challenge.criteria,
        ideal_pitch_embeddings: challenge.ideal_pitch_embeddings,
        recording_duration: args.duration,
        ..Default::default()
    })
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        process::exit(1);
    }

    let input = match parse_args(&args) {
        Ok(input) => input,
        Err(e) => {
            log_error(&e.to_string());
            print_usage();
            process::exit(1);
        }
    };

    let s = settings();
    let embeddings = match EmbeddingHandle::spawn(&s.embeddings) {
        Ok(handle) => handle,
        Err(e) => {
            log_error(&format!("failed to start embedding model: {e}"));
            process::exit(1);
        }
    };
    if let Err(e) = embeddings.ready().await {
        log_error(&e.to_string());
        process::exit(1);
    }

    let job = match input {
        Input::JobFile(path) => load_job(&path, &embeddings, &s).await,
        Input::AdHoc(args) => build_job(args, &embeddings, &s).await,
    };
    let job = match job {
        Ok(job) => job,
        Err(e) => {
            log_error(&format!("{e:#}"));
            process::exit(1);
        }
    };

    let report = evaluate_submission(&embeddings, &job, &s).await;
    print_report(&report);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_criteria() {
        let criteria = parse_criteria("discount:3, scam:-4,").unwrap();
        assert_eq!(
            criteria,
            vec![("discount".to_string(), 3), ("scam".to_string(), -4)]
        );
    }

    #[test]
    fn test_parse_criteria_keeps_colons_in_keyword() {
        let criteria = parse_criteria("price: low:2").unwrap();
        assert_eq!(criteria, vec![("price: low".to_string(), 2)]);
    }

    #[test]
    fn test_parse_criteria_rejects_bad_weight() {
        assert!(parse_criteria("discount").is_err());
        assert!(parse_criteria("discount:lots").is_err());
    }

    #[test]
    fn test_parse_job_file() {
        let Input::JobFile(path) = parse_args(&args(&["job.json"])).unwrap() else {
            panic!("expected a job file");
        };
        assert_eq!(path, "job.json");
    }

    #[test]
    fn test_parse_ad_hoc() {
        let input = parse_args(&args(&[
            "--criteria",
            "discount:3",
            "we",
            "offer",
            "--duration",
            "12.5",
            "a discount",
        ]))
        .unwrap();
        let Input::AdHoc(parsed) = input else {
            panic!("expected ad-hoc input");
        };
        assert_eq!(parsed.criteria, vec![("discount".to_string(), 3)]);
        assert_eq!(parsed.duration, Some(12.5));
        assert_eq!(parsed.transcript, "we offer a discount");
        assert_eq!(parsed.ideal_pitch, None);
    }

    #[test]
    fn test_parse_requires_transcript() {
        assert!(parse_args(&args(&["--criteria", "discount:3"])).is_err());
        assert!(parse_args(&args(&["--duration"])).is_err());
    }
}
