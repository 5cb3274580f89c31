//! Shared fixtures for behavior tests: a scripted exchange website and
//! warehouse helpers.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use histsync_core::{
    HttpClient, HttpError, HttpRequest, HttpResponse, MseSource, RateLimiter, RetryConfig,
};
use histsync_warehouse::{Warehouse, WarehouseConfig};
use tempfile::TempDir;

pub const BASE_URL: &str = "http://mse.test";

/// In-memory stand-in for the exchange website.
///
/// History pages serve the same rows for every window of a code, the way a
/// thinly traded issuer looks when one trade falls inside every range.
#[derive(Default)]
pub struct FakeExchange {
    schedule: Mutex<Vec<String>>,
    companies: Mutex<HashMap<String, String>>,
    histories: Mutex<HashMap<String, Vec<Vec<String>>>>,
    failures_left: Mutex<HashMap<String, usize>>,
    broken: Mutex<HashSet<String>>,
    requests: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeExchange {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn list_issuers(&self, codes: &[&str]) {
        *self.schedule.lock().expect("schedule lock") =
            codes.iter().map(|code| code.to_string()).collect();
    }

    pub fn publish_company(&self, code: &str, html: String) {
        self.companies
            .lock()
            .expect("companies lock")
            .insert(code.to_string(), html);
    }

    pub fn publish_history(&self, code: &str, rows: Vec<Vec<&str>>) {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(str::to_string).collect())
            .collect();
        self.histories
            .lock()
            .expect("histories lock")
            .insert(code.to_string(), rows);
    }

    /// The next `times` history requests for `code` answer 503.
    pub fn fail_history(&self, code: &str, times: usize) {
        self.failures_left
            .lock()
            .expect("failures lock")
            .insert(code.to_string(), times);
    }

    /// Every history request for `code` answers 503.
    pub fn break_history(&self, code: &str) {
        self.broken
            .lock()
            .expect("broken lock")
            .insert(code.to_string());
    }

    pub fn respond_after(&self, delay: Duration) {
        *self.delay.lock().expect("delay lock") = delay;
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn history_requests_for(&self, code: &str) -> usize {
        let prefix = format!("{BASE_URL}/mk/stats/symbolhistory/{code}?");
        self.requested_urls()
            .iter()
            .filter(|url| url.starts_with(&prefix))
            .count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, url: &str) -> HttpResponse {
        let Some(path) = url.strip_prefix(BASE_URL) else {
            return HttpResponse::with_status(404);
        };

        if path == "/en/stats/current-schedule" {
            let codes = self.schedule.lock().expect("schedule lock").clone();
            return HttpResponse::ok_html(schedule_page(&codes));
        }

        if let Some(code) = path.strip_prefix("/en/symbol/") {
            return match self.companies.lock().expect("companies lock").get(code) {
                Some(html) => HttpResponse::ok_html(html.clone()),
                None => HttpResponse::with_status(404),
            };
        }

        if let Some(rest) = path.strip_prefix("/mk/stats/symbolhistory/") {
            let code = rest.split('?').next().unwrap_or_default();
            if self.broken.lock().expect("broken lock").contains(code) {
                return HttpResponse::with_status(503);
            }
            if let Some(left) = self
                .failures_left
                .lock()
                .expect("failures lock")
                .get_mut(code)
            {
                if *left > 0 {
                    *left -= 1;
                    return HttpResponse::with_status(503);
                }
            }
            let rows = self
                .histories
                .lock()
                .expect("histories lock")
                .get(code)
                .cloned()
                .unwrap_or_default();
            return HttpResponse::ok_html(history_page(&rows));
        }

        HttpResponse::with_status(404)
    }
}

impl HttpClient for FakeExchange {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            self.requests
                .lock()
                .expect("requests lock")
                .push(request.url.clone());

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            let delay = *self.delay.lock().expect("delay lock");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let response = self.respond(&request.url);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            Ok(response)
        })
    }
}

pub fn schedule_page(codes: &[String]) -> String {
    let rows: String = codes
        .iter()
        .map(|code| format!("<tr><td>{code}</td><td>Issuer {code}</td><td>1.000,00</td></tr>"))
        .collect();
    format!("<html><body><table><thead><tr><th>Code</th></tr></thead><tbody>{rows}</tbody></table></body></html>")
}

pub fn history_page(rows: &[Vec<String>]) -> String {
    let rows: String = rows
        .iter()
        .map(|row| {
            let cells: String = row.iter().map(|cell| format!("<td>{cell}</td>")).collect();
            format!("<tr>{cells}</tr>")
        })
        .collect();
    format!("<html><body><table><tbody>{rows}</tbody></table></body></html>")
}

pub fn company_page(name: &str, city: &str, phones: &str) -> String {
    format!(
        r#"<html><body><div class="panel panel-default">
            <div class="title">{name}</div>
            <div id="izdavach">
              <div class="row"><div>Issuer profile</div></div>
              <div class="row"><div>Contact</div></div>
              <div class="row"><div>Address</div><div>Main Street 1</div></div>
              <div class="row"><div>City</div><div>{city}</div></div>
              <div class="row"><div>State</div><div>North Macedonia</div></div>
              <div class="row"><div>Mail</div><div>info@example.mk</div></div>
              <div class="row"><div>Phone</div><div>{phones}</div></div>
            </div>
        </div></body></html>"#
    )
}

/// A history row in the exchange's cell order.
pub fn trading_day<'a>(date: &'a str, price: &'a str) -> Vec<&'a str> {
    vec![date, price, price, price, price, "0,00", "100", "10.000", "10.000"]
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig::fixed(Duration::from_millis(1), 2)
}

pub fn mse_source(exchange: &Arc<FakeExchange>, max_in_flight: usize) -> MseSource {
    let client: Arc<dyn HttpClient> = exchange.clone();
    MseSource::new(client, RateLimiter::new(max_in_flight, None))
        .with_base_url(BASE_URL)
        .with_retry(fast_retry())
}

pub fn open_warehouse(temp: &TempDir) -> Warehouse {
    Warehouse::open(WarehouseConfig {
        histsync_home: temp.path().to_path_buf(),
        db_path: temp.path().join("warehouse.duckdb"),
        max_pool_size: 2,
    })
    .expect("warehouse open")
}
