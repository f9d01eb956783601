use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "image-cli")]
#[command(about = "Management CLI for the image server", long_about = None)]
struct Cli {
    #[arg(short, long, env = "IMAGE_SERVER_URL", default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "API_KEY", default_value = "dev-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload an image into a project
    Upload { project: String, file: PathBuf },
    /// List the images stored in a project
    List { project: String },
    /// Download an image to disk
    Download {
        project: String,
        filename: String,
        /// Destination path (defaults to the stored name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete an image
    Delete { project: String, filename: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = Url::parse(&cli.url)?;

    let mut headers = HeaderMap::new();
    headers.insert("X-API-Key", HeaderValue::from_str(&cli.key)?);

    match cli.command {
        Commands::Upload { project, file } => {
            let data = tokio::fs::read(&file).await?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let mime = mime_guess::from_path(&file).first_or_octet_stream();
            let part = Part::bytes(data)
                .file_name(file_name)
                .mime_str(mime.as_ref())?;

            let res = client
                .post(endpoint(&base, &[project.as_str(), "images"])?)
                .headers(headers)
                .multipart(Form::new().part("file", part))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::List { project } => {
            let res = client
                .get(endpoint(&base, &[project.as_str(), "images"])?)
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Download {
            project,
            filename,
            output,
        } => {
            let res = client
                .get(endpoint(&base, &[project.as_str(), "images", filename.as_str(), "download"])?)
                .headers(headers)
                .send()
                .await?;
            if !res.status().is_success() {
                return print_response(res).await;
            }
            let output = output.unwrap_or_else(|| PathBuf::from(&filename));
            let bytes = res.bytes().await?;
            tokio::fs::write(&output, &bytes).await?;
            println!("Saved {} bytes to {}", bytes.len(), output.display());
        }
        Commands::Delete { project, filename } => {
            let res = client
                .delete(endpoint(&base, &[project.as_str(), "images", filename.as_str()])?)
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

/// `{base}/api/v1/projects/{segments...}` with every segment percent-encoded.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, Box<dyn Error>> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| format!("{} cannot be used as a base URL", base))?
        .pop_if_empty()
        .extend(["api", "v1", "projects"])
        .extend(segments);
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
