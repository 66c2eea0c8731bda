//! Runs a compiled plan statement by statement.

use std::sync::Arc;

use crate::ast::DownloadKind;
use crate::buffer::BufferStore;
use crate::codegen::{DownloadStep, Plan, SelectStep, SourceStep, Step, UrlStep};
use crate::config::{FailurePolicy, RuntimeConfig};
use crate::dom::DomFactory;
use crate::download::{download_images, download_json, download_pages};
use crate::error::RuntimeError;
use crate::evaluator::{Evaluator, RowContext};
use crate::extract::Extractor;
use crate::http::{RequestFactory, Wire};
use crate::table::RuntimeTable;
use crate::value::Value;

/// A compiled script bound to its fetching and parsing collaborators.
///
/// Every call to [`Runnable::run`] starts with empty buffers, so a plan can
/// be run repeatedly with the same results for the same responses.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use pickaxe_lang::{Runnable, ScraperDomFactory, compile};
/// use pickaxe_lang::http::{DownloadError, HttpRequest, RequestFactory, Wire};
///
/// struct Offline;
///
/// impl RequestFactory for Offline {
///     fn create(&self, _wire: &Wire) -> Box<dyn HttpRequest> {
///         unreachable!("script does not download")
///     }
/// }
///
/// let plan = compile("select 1, 2 as num").unwrap();
/// let tables = Runnable::new(plan, Arc::new(Offline), Arc::new(ScraperDomFactory::new()))
///     .collect()
///     .unwrap();
/// assert_eq!(tables[0].labels(), vec!["(No column name)", "num"]);
/// ```
pub struct Runnable {
    plan: Plan,
    requests: Arc<dyn RequestFactory>,
    dom: Arc<dyn DomFactory>,
    config: RuntimeConfig,
}

impl Runnable {
    pub fn new(plan: Plan, requests: Arc<dyn RequestFactory>, dom: Arc<dyn DomFactory>) -> Self {
        Runnable {
            plan,
            requests,
            dom,
            config: RuntimeConfig::default(),
        }
    }

    /// Runnable fetching over HTTP and parsing with scraper.
    #[cfg(feature = "http")]
    pub fn with_http(plan: Plan, config: RuntimeConfig) -> Result<Self, crate::http::DownloadError> {
        let requests = crate::http::HttpRequestFactory::new(&config)?;
        Ok(Runnable::new(plan, Arc::new(requests), Arc::new(crate::dom::ScraperDomFactory::new()))
            .with_config(config))
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs every step in order, handing each select's table to
    /// `on_select` as soon as it is complete.
    ///
    /// The first runtime error stops the run; tables already delivered
    /// stay delivered.
    pub fn run<F>(&self, mut on_select: F) -> Result<(), RuntimeError>
    where
        F: FnMut(RuntimeTable),
    {
        let mut buffers = BufferStore::new();

        for (index, step) in self.plan.steps.iter().enumerate() {
            match step {
                Step::CreateBuffer { name, schema } => {
                    tracing::debug!(step = index, buffer = %name, "create buffer");
                    buffers.create(name, schema.clone())?;
                }
                Step::Insert {
                    buffer,
                    targets,
                    select,
                } => {
                    let table = self.select(select, &buffers)?;
                    let count = table.row_count();
                    for row in table.into_rows() {
                        buffers.insert(buffer, targets, row)?;
                    }
                    tracing::debug!(step = index, buffer = %buffer, rows = count, "insert");
                }
                Step::Select(select) => {
                    let table = self.select(select, &buffers)?;
                    tracing::debug!(step = index, rows = table.row_count(), "select");
                    on_select(table);
                }
            }
        }
        Ok(())
    }

    /// Runs the plan and returns every select's table in order.
    pub fn collect(&self) -> Result<Vec<RuntimeTable>, RuntimeError> {
        let mut tables = Vec::new();
        self.run(|table| tables.push(table))?;
        Ok(tables)
    }

    fn select(&self, step: &SelectStep, buffers: &BufferStore) -> Result<RuntimeTable, RuntimeError> {
        let extractor = Extractor::prepare(step, self.dom.as_ref())?;
        let evaluator = Evaluator::new(&extractor);
        let mut table = RuntimeTable::new(step.columns.clone());

        match &step.source {
            SourceStep::Single => emit(&evaluator, step, &RowContext::default(), &mut table)?,
            SourceStep::Buffer(name) => {
                for row in buffers.get(name)?.rows() {
                    emit(&evaluator, step, &RowContext::buffer(row), &mut table)?;
                }
            }
            SourceStep::Download(download) => {
                let wires = self.wires(download, buffers)?;
                self.download(step, download, wires, &extractor, &evaluator, &mut table)?;
            }
        }
        Ok(table)
    }

    fn wires(&self, download: &DownloadStep, buffers: &BufferStore) -> Result<Vec<Wire>, RuntimeError> {
        let urls = match &download.urls {
            UrlStep::Literal(url) => vec![url.clone()],
            UrlStep::Query(query) => self
                .select(query, buffers)?
                .rows()
                .filter_map(|row| row.first())
                .filter(|value| !value.is_null())
                .map(Value::to_string)
                .collect(),
        };

        Ok(urls
            .into_iter()
            .map(|url| Wire {
                url,
                js: download.js,
                threads: download.threads,
            })
            .collect())
    }

    fn download(
        &self,
        step: &SelectStep,
        download: &DownloadStep,
        wires: Vec<Wire>,
        extractor: &Extractor,
        evaluator: &Evaluator<'_>,
        table: &mut RuntimeTable,
    ) -> Result<(), RuntimeError> {
        let threads = self.config.threads_for(download.threads, wires.len());
        let stop_on_error = self.config.download_failure == FailurePolicy::Abort;
        tracing::info!(kind = ?download.kind, wires = wires.len(), threads, "downloading");

        match download.kind {
            DownloadKind::Page => {
                let pages = download_pages(
                    wires,
                    threads,
                    stop_on_error,
                    Arc::clone(&self.requests),
                    Arc::clone(&self.dom),
                );
                for row in pages.rows() {
                    let wire = row.wire();
                    match row.resolve() {
                        Ok(page) => {
                            let contexts =
                                extractor.contexts(page.document.as_ref(), download.nodes.as_deref())?;
                            for element in &contexts {
                                let ctx = RowContext::page(&page, element.as_ref());
                                emit(evaluator, step, &ctx, table)?;
                            }
                        }
                        Err(err) => self.failed_wire(err, wire, step, evaluator, table)?,
                    }
                }
            }
            DownloadKind::Image => {
                let images = download_images(wires, threads, stop_on_error, Arc::clone(&self.requests));
                for row in images.rows() {
                    let wire = row.wire();
                    match row.resolve() {
                        Ok(image) => emit(evaluator, step, &RowContext::image(&image), table)?,
                        Err(err) => self.failed_wire(err, wire, step, evaluator, table)?,
                    }
                }
            }
            DownloadKind::Json => {
                let responses = download_json(wires, threads, stop_on_error, Arc::clone(&self.requests));
                for row in responses.rows() {
                    let wire = row.wire();
                    match row.resolve() {
                        Ok(objects) => {
                            for object in &objects {
                                emit(evaluator, step, &RowContext::json(object), table)?;
                            }
                        }
                        Err(err) => self.failed_wire(err, wire, step, evaluator, table)?,
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies the failure policy to a wire that could not be fetched.
    ///
    /// Under `NullRow` the wire becomes one candidate row that knows only
    /// its url. It goes through the select's filter like any other row.
    fn failed_wire(
        &self,
        err: RuntimeError,
        wire: &Wire,
        step: &SelectStep,
        evaluator: &Evaluator<'_>,
        table: &mut RuntimeTable,
    ) -> Result<(), RuntimeError> {
        if self.config.download_failure == FailurePolicy::Abort
            || !matches!(err, RuntimeError::Download { .. })
        {
            return Err(err);
        }

        tracing::warn!(url = %wire.url, error = %err, "keeping failed wire as a null row");
        emit(evaluator, step, &RowContext::failed(&wire.url), table)
    }
}

/// Filters one candidate row and appends its projection.
fn emit(
    evaluator: &Evaluator<'_>,
    step: &SelectStep,
    ctx: &RowContext<'_>,
    table: &mut RuntimeTable,
) -> Result<(), RuntimeError> {
    if let Some(filter) = &step.filter
        && !evaluator.eval(filter, ctx)?.is_truthy()
    {
        return Ok(());
    }

    let row = step
        .projections
        .iter()
        .map(|operand| evaluator.eval(operand, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    table.push_row(row)
}
