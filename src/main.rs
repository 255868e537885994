mod autonomous;
mod blackboard;
mod bus;
mod config;
mod simulation;

use anyhow::{Context, anyhow};
use autonomous::{RouteReport, RouteRunner};
use blackboard::{Blackboard, State, raise_fault, snapshot, trigger_estop};
use bus::{Telemetry, Topic};
use parking_lot::RwLock;
use roboseed_control::{CancelToken, ChassisDriver, PositionEstimator};
use simulation::{Plant, SimEstimator, SimMotors};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{self, EnvFilter};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Roboseed chassis simulator started.");

    // optional override file as the first argument
    let override_path = std::env::args().nth(1);
    let cfg = config::load_config(override_path.as_deref()).context("Failed to load configuration")?;
    let chassis_config = cfg.chassis.to_chassis_config();

    let plant = Plant::new(&cfg.plant);
    let bb: Blackboard = Arc::new(RwLock::new(State::at(plant.pose)));
    let telemetry: Topic<Telemetry> = Topic::new(cfg.runtime.telemetry_capacity);
    let cancel = CancelToken::new();
    let stop = CancelToken::new();

    let tokio_rt = tokio::runtime::Runtime::new().context("Failed to start the tokio runtime")?;
    tokio_rt.spawn(async_runtime(
        bb.clone(),
        telemetry.subscribe(),
        cancel.clone(),
        stop.clone(),
        cfg.runtime.watchdog_timeout(),
    ));

    info!("Spawning plant thread...");
    let plant_thread = std::thread::Builder::new().name("plant".into()).spawn({
        let bb = Arc::clone(&bb);
        let stop = stop.clone();
        let period = cfg.runtime.plant_period();
        move || simulation::run_plant(bb, plant, period, stop)
    })?;

    info!("Spawning control thread...");
    let control_thread = std::thread::Builder::new().name("control".into()).spawn({
        let bb = Arc::clone(&bb);
        let cfg = cfg.clone();
        move || -> anyhow::Result<RouteReport> {
            let estimator = SimEstimator::new(Arc::clone(&bb), &cfg.plant);
            let motors = SimMotors::new(bb);
            let mut driver = ChassisDriver::new(estimator, motors, chassis_config)
                .context("Invalid chassis configuration")?;
            driver.set_auto_mode(cfg.chassis.auto_mode);

            let mut runner = RouteRunner::new(
                driver,
                cfg.runtime.control_period(),
                cancel,
                telemetry,
                cfg.runtime.abort_on_stuck,
            );
            let report = runner.run(&cfg.route)?;
            info!(estimate = %runner.driver().estimator().position(), "Final position estimate.");
            Ok(report)
        }
    })?;

    let result = control_thread
        .join()
        .map_err(|_| anyhow!("Control thread panicked"))?;

    stop.cancel();
    if plant_thread.join().is_err() {
        error!("Plant thread panicked.");
    }
    tokio_rt.shutdown_timeout(Duration::from_millis(100));

    let truth = snapshot(&bb);
    match result {
        Ok(report) => {
            info!(?report, pose = %truth.pose, faults = ?truth.faults, "Simulation finished.");
            Ok(())
        }
        Err(e) => {
            error!(pose = %truth.pose, faults = ?truth.faults, "Route failed: {:?}", e);
            Err(e)
        }
    }
}

async fn async_runtime(
    bb: Blackboard,
    telemetry_rx: broadcast::Receiver<Arc<Telemetry>>,
    cancel: CancelToken,
    stop: CancelToken,
    watchdog_timeout: Duration,
) {
    info!("Async runtime started.");
    let outcome = tokio::try_join!(
        watchdog(bb, watchdog_timeout, stop),
        telemetry_logger(telemetry_rx),
        interrupt(cancel),
    );
    match outcome {
        Ok(_) => info!("Async runtime finished."),
        Err(e) => error!("Async task failed: {:?}", e),
    }
}

/// E-stops the chassis when the control thread stops sending commands.
async fn watchdog(bb: Blackboard, timeout: Duration, stop: CancelToken) -> anyhow::Result<()> {
    info!("Watchdog task started.");
    let mut tick = tokio::time::interval(Duration::from_millis(25));
    loop {
        tick.tick().await;
        if stop.is_cancelled() {
            return Ok(());
        }
        let state = snapshot(&bb);
        if state.estop {
            continue;
        }
        let age = Instant::now().saturating_duration_since(state.last_cmd_ts);
        if age > timeout {
            warn!(?age, last_cmd_ts = ?state.last_cmd_ts, "Wheel command timeout! Triggering E-stop.");
            trigger_estop(&bb);
            raise_fault(&bb, "wheel command timeout");
        }
    }
}

async fn telemetry_logger(mut rx: broadcast::Receiver<Arc<Telemetry>>) -> anyhow::Result<()> {
    loop {
        match rx.recv().await {
            Ok(t) => debug!(
                step = t.route_step,
                elapsed = ?t.elapsed,
                position = %t.position,
                heading = t.heading,
                position_error = %t.position_error,
                heading_error = t.heading_error,
                power = %t.power,
                wheels = %t.wheels,
                status = ?t.status,
                "Telemetry"
            ),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Telemetry logger fell behind."),
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

async fn interrupt(cancel: CancelToken) -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    warn!("Ctrl-C received, cancelling the route.");
    cancel.cancel();
    Ok(())
}
