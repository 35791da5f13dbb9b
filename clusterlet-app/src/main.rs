use anyhow::Context;
use clusterlet::prelude::*;
use clusterlet::pipeline::Notice;
use clusterlet::runtime::spawners::tokio_impl::TokioSpawner;

const VIEW_SIZE: Point = Point { x: 1200.0, y: 800.0 };
const FRAME: Duration = Duration::from_millis(16);
const SETTLE_LIMIT: Duration = Duration::from_secs(15);

/// Headless driver: replays a short map session against a live clustering service
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clusterlet::init_logging();
    clusterlet::runtime::init_runtime(Arc::new(TokioSpawner));

    let base_url =
        std::env::var("CLUSTERLET_SERVICE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    let config = match std::env::var("CLUSTERLET_CONFIG") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading pipeline config from {path}"))?;
            PipelineConfig::from_json_str(&json).context("parsing pipeline config")?
        }
        Err(_) => SyncProfile::Balanced.resolve(),
    };

    let service = Arc::new(
        HttpClusterService::new(ServiceConfig::new(base_url.clone()))
            .context("building HTTP client")?,
    );
    log::info!("using clustering service at {}", base_url);

    let mut pipeline = ClusterPipeline::new(config, service.clone(), LoggingSurface::default())?;

    match service.available_filters().await {
        Ok(catalogue) => {
            log::info!("service offers {} filters", catalogue.len());
            pipeline.set_catalogue(catalogue, Instant::now());
        }
        Err(err) => log::warn!("could not load filter catalogue, using defaults: {}", err),
    }

    let _status = pipeline.subscribe_status(|status| match &status.notice {
        Some(Notice::ZoomIn) => log::info!("notice: zoom in to see learners"),
        Some(Notice::FetchFailed(message)) => log::warn!("notice: {}", message),
        None => log::debug!("status: loading={}", status.loading),
    });
    let _details = pipeline.subscribe_detail(|request| {
        log::info!(
            "detail view for {:?} (story={}, video={})",
            request.feature_id,
            request.flags.story,
            request.flags.is_featured_video
        );
    });

    let session = async {
        // Whole continent, then a closer look, then a filtered view
        move_camera(&mut pipeline, LatLng::new(2.0, 20.0), 3.0).await;
        move_camera(&mut pipeline, LatLng::new(-1.29, 36.82), 6.0).await;

        pipeline.toggle_filter("is_graduate_learner", true, Instant::now())?;
        run_until_settled(&mut pipeline).await;

        drill_into_largest_cluster(&mut pipeline).await;

        pipeline.set_layer_selection(LayerSelection::FeaturedOnly);
        let featured = pipeline.render().visible_points().first().map(|p| (*p).clone());
        if let Some(point) = featured {
            pipeline.handle_event(MapEvent::PointClick { point }, Instant::now());
        }

        move_camera(&mut pipeline, LatLng::new(0.0, 0.0), 1.0).await;
        anyhow::Ok(())
    };

    tokio::select! {
        result = session => result?,
        _ = tokio::signal::ctrl_c() => log::info!("interrupted"),
    }

    match service.stats().await {
        Ok(stats) => log::info!(
            "service cache: {} hits, {} misses, {} indexes",
            stats.cache_hits,
            stats.cache_misses,
            stats.cached_indexes
        ),
        Err(err) => log::warn!("could not read service stats: {}", err),
    }

    pipeline.shutdown();
    Ok(())
}

/// Emulates a user drag ending on `center` at `zoom`
async fn move_camera(pipeline: &mut ClusterPipeline<LoggingSurface>, center: LatLng, zoom: f64) {
    let now = Instant::now();
    pipeline.handle_event(MapEvent::DragStart, now);
    pipeline.handle_event(
        MapEvent::ViewChanged {
            camera: Camera::around(center, zoom, VIEW_SIZE),
        },
        now,
    );
    pipeline.handle_event(MapEvent::DragEnd, now);
    run_until_settled(pipeline).await;
}

async fn drill_into_largest_cluster(pipeline: &mut ClusterPipeline<LoggingSurface>) {
    let largest = pipeline
        .render()
        .features()
        .clusters()
        .max_by_key(|cluster| cluster.point_count)
        .cloned();
    let Some(cluster) = largest else {
        log::info!("no clusters rendered; skipping drill-down");
        return;
    };

    pipeline.handle_event(MapEvent::ClusterClick { cluster }, Instant::now());
    run_until_settled(pipeline).await;
}

/// Ticks like a render loop until no timers or requests are outstanding
async fn run_until_settled(pipeline: &mut ClusterPipeline<LoggingSurface>) {
    let started = Instant::now();
    loop {
        // Play back camera animations the pipeline asked for
        if let Some((center, zoom)) = pipeline.surface_mut().pending_moves.pop() {
            let now = Instant::now();
            pipeline.handle_event(MapEvent::MoveStart, now);
            pipeline.handle_event(
                MapEvent::ViewChanged {
                    camera: Camera::around(center, zoom, VIEW_SIZE),
                },
                now,
            );
            pipeline.handle_event(MapEvent::MoveEnd, now);
        }

        pipeline.tick(Instant::now());
        let busy = pipeline.status().loading
            || pipeline.next_deadline().is_some()
            || !pipeline.surface().pending_moves.is_empty();
        if !busy {
            break;
        }
        if started.elapsed() > SETTLE_LIMIT {
            log::warn!("pipeline still busy after {:?}; moving on", SETTLE_LIMIT);
            break;
        }
        tokio::time::sleep(FRAME).await;
    }
}

/// Surface that logs what a renderer would draw
#[derive(Default)]
struct LoggingSurface {
    pending_moves: Vec<(LatLng, f64)>,
}

impl MapSurface for LoggingSurface {
    fn set_source_data(&mut self, source_id: &str, features: &FeatureCollection) {
        log::info!(
            "[{}] {} clusters, {} points",
            source_id,
            features.clusters().count(),
            features.points().count()
        );
    }

    fn set_layer_visibility(&mut self, layer_id: &str, visible: bool) {
        log::debug!("layer {} visible={}", layer_id, visible);
    }

    fn ease_to(&mut self, center: LatLng, zoom: f64) {
        log::info!("camera -> ({:.4}, {:.4}) @ z{:.1}", center.lat, center.lng, zoom);
        self.pending_moves.push((center, zoom));
    }
}
