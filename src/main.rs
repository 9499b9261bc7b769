use std::process;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

use vellum::application::convert::ConvertService;
use vellum::application::documents::DocumentService;
use vellum::application::error::AppError;
use vellum::application::render::{
    PdfRenderer, RenderError, SystemFontRasterizer, Transformer,
};
use vellum::config::{self, CliArgs, Command, RenderArgs, Settings};
use vellum::domain::types::format_for_upload;
use vellum::infra::db::PostgresRepositories;
use vellum::infra::error::InfraError;
use vellum::infra::http::{ApiState, build_router};
use vellum::infra::storage::FsArtifactStore;
use vellum::infra::telemetry;

#[derive(Debug, Error)]
enum BootError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    App(#[from] AppError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        report_boot_error(&err);
        process::exit(1);
    }
}

fn report_boot_error(err: &BootError) {
    if dispatcher::has_been_set() {
        error!(error = %err, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %err, "application error");
    });
}

async fn run() -> Result<(), BootError> {
    let cli = CliArgs::parse();
    let settings = config::load(&cli)?;
    telemetry::init(&settings.logging)?;

    match cli.command {
        Some(Command::Render(args)) => run_render(&settings, args).await,
        Some(Command::Serve(_)) | None => run_serve(settings).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), BootError> {
    let Some(url) = settings.database.url.as_deref() else {
        return Err(InfraError::configuration(
            "database.url is required to run the service",
        )
        .into());
    };

    let pool =
        PostgresRepositories::connect(url, settings.database.max_connections.get()).await?;
    PostgresRepositories::run_migrations(&pool).await?;
    let repositories = PostgresRepositories::new(pool);

    let store = FsArtifactStore::new(settings.storage.directory.clone())?;
    let (transformer, renderer) = build_pipeline(&settings);

    let documents = DocumentService::new(
        Arc::new(repositories.clone()),
        Arc::new(store),
        Arc::clone(&transformer),
        Arc::clone(&renderer),
    );
    let convert = ConvertService::new(transformer, renderer);

    let router = build_router(ApiState {
        documents,
        convert,
        db: Some(repositories),
    });

    let listener = TcpListener::bind(settings.server.addr).await?;
    info!(addr = %settings.server.addr, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}

/// One-shot file conversion, no database or listener involved.
async fn run_render(settings: &Settings, args: RenderArgs) -> Result<(), BootError> {
    let input_name = args
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let Some((content_format, _)) = format_for_upload(&input_name) else {
        return Err(AppError::validation(format!(
            "unsupported input file `{input_name}`; expected .md, .markdown, .txt, .html or .htm"
        ))
        .into());
    };

    let content = tokio::fs::read_to_string(&args.input).await?;
    let (transformer, renderer) = build_pipeline(settings);

    let page_numbers = args.page_numbers;
    let pdf = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, RenderError> {
        let html = transformer.transform(&content, content_format)?;
        renderer.render(&html, page_numbers)
    })
    .await
    .map_err(|err| AppError::Task(err.to_string()))??;

    tokio::fs::write(&args.output, &pdf).await?;
    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        bytes = pdf.len(),
        "rendered"
    );
    Ok(())
}

fn build_pipeline(settings: &Settings) -> (Arc<Transformer>, Arc<PdfRenderer>) {
    let math = Arc::new(SystemFontRasterizer::from_system_fonts());
    let transformer = Arc::new(Transformer::new(math));
    let renderer = Arc::new(PdfRenderer::new(settings.render.fetch_timeout));
    (transformer, renderer)
}
