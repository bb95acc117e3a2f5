//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Recolecta y agrega métricas del servidor en tiempo real: el acceptor
//! registra admisiones y rechazos, los workers registran cada conexión
//! atendida.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Máximo de latencias a guardar (para calcular percentiles)
const MAX_LATENCIES: usize = 10_000;

/// Máximo de rutas distintas contadas por separado. Las rutas las elige el
/// cliente, así que el resto se acumula en `OTHER_PATHS`.
const MAX_TRACKED_PATHS: usize = 1_000;

/// Clave que agrupa las rutas que ya no entran en el mapa
const OTHER_PATHS: &str = "<other>";

/// Collector de métricas thread-safe
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsData>>,
    start_time: Instant,
}

/// Datos internos de métricas
#[derive(Default)]
struct MetricsData {
    /// Conexiones aceptadas y encoladas
    accepted: u64,

    /// Conexiones cerradas sin servir porque la cola ya estaba cerrada
    rejected: u64,

    /// Requests respondidas, por código de estado
    status_codes: HashMap<u16, u64>,

    /// Conexiones en las que el handler falló
    failed: u64,

    /// Latencias registradas (en microsegundos), ventana de las últimas N
    latencies: VecDeque<u64>,

    /// Requests por ruta (acotado a `MAX_TRACKED_PATHS` + `OTHER_PATHS`)
    requests_per_path: HashMap<String, u64>,
}

impl MetricsData {
    fn count_path(&mut self, path: &str) {
        if let Some(count) = self.requests_per_path.get_mut(path) {
            *count += 1;
            return;
        }

        let tracked = self.requests_per_path.len()
            - usize::from(self.requests_per_path.contains_key(OTHER_PATHS));
        let key = if tracked < MAX_TRACKED_PATHS {
            path
        } else {
            OTHER_PATHS
        };
        *self.requests_per_path.entry(key.to_string()).or_insert(0) += 1;
    }
}

impl MetricsCollector {
    /// Crea un nuevo collector de métricas
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsData {
                latencies: VecDeque::with_capacity(MAX_LATENCIES),
                ..MetricsData::default()
            })),
            start_time: Instant::now(),
        }
    }

    // Un panic en otro thread no debe invalidar las métricas
    fn data(&self) -> MutexGuard<'_, MetricsData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registra una conexión admitida en la cola
    pub fn record_accepted(&self) {
        self.data().accepted += 1;
    }

    /// Registra una conexión rechazada por la cola cerrada
    pub fn record_rejected(&self) {
        self.data().rejected += 1;
    }

    /// Registra una request respondida
    pub fn record_request(&self, path: &str, status_code: u16, latency: Duration) {
        let mut data = self.data();

        *data.status_codes.entry(status_code).or_insert(0) += 1;

        // Si tenemos demasiadas latencias, eliminar las más antiguas
        if data.latencies.len() >= MAX_LATENCIES {
            data.latencies.pop_front();
        }
        data.latencies.push_back(latency.as_micros() as u64);

        data.count_path(path);
    }

    /// Registra una conexión en la que el handler falló
    pub fn record_failure(&self) {
        self.data().failed += 1;
    }

    /// Obtiene un snapshot de las métricas
    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.data();
        let latencies: Vec<u64> = data.latencies.iter().copied().collect();
        let (p50, p95, p99, avg) = calculate_percentiles(&latencies);

        // Top 10 rutas más pedidas
        let mut paths: Vec<_> = data.requests_per_path.iter().collect();
        paths.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let top_paths = paths
            .into_iter()
            .take(10)
            .map(|(path, count)| PathCount {
                path: path.clone(),
                count: *count,
            })
            .collect();

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            accepted: data.accepted,
            rejected: data.rejected,
            served: data.status_codes.values().sum(),
            failed: data.failed,
            status_codes: data
                .status_codes
                .iter()
                .map(|(code, count)| (*code, *count))
                .collect(),
            top_paths,
            latency_us: LatencySummary {
                p50,
                p95,
                p99,
                avg,
                stddev: calculate_stddev(&latencies, avg),
                samples: latencies.len(),
            },
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Calcula percentiles de latencia: (p50, p95, p99, avg)
fn calculate_percentiles(latencies: &[u64]) -> (u64, u64, u64, u64) {
    if latencies.is_empty() {
        return (0, 0, 0, 0);
    }

    let mut sorted = latencies.to_vec();
    sorted.sort_unstable();

    let len = sorted.len();
    let p50 = sorted[len * 50 / 100];
    let p95 = sorted[len * 95 / 100];
    let p99 = sorted[len * 99 / 100];

    let sum: u64 = sorted.iter().sum();
    let avg = sum / len as u64;

    (p50, p95, p99, avg)
}

fn calculate_stddev(latencies: &[u64], avg: u64) -> f64 {
    if latencies.is_empty() {
        return 0.0;
    }

    let variance: f64 = latencies
        .iter()
        .map(|&x| {
            let diff = x as f64 - avg as f64;
            diff * diff
        })
        .sum::<f64>()
        / latencies.len() as f64;

    variance.sqrt()
}

/// Snapshot de métricas (para uso externo)
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub served: u64,
    pub failed: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub top_paths: Vec<PathCount>,
    pub latency_us: LatencySummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathCount {
    pub path: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub avg: u64,
    pub stddev: f64,
    pub samples: usize,
}

impl MetricsSnapshot {
    /// Serializa el snapshot en JSON compacto
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
    }

    /// Número de respuestas con el código dado
    pub fn count_for(&self, status_code: u16) -> u64 {
        self.status_codes.get(&status_code).copied().unwrap_or(0)
    }
}
