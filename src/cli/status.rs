//! Provider status command
//!
//! One round of connection tests by default; `--watch` keeps a monitor
//! running and redraws the board after every round.

use std::thread;
use std::time::Duration;

use clap::Args;

use crate::display::{format_connection_statuses, format_status_board};
use crate::error::{BillPayError, BillPayResult};
use crate::models::{ConnectionStatus, ProviderId};
use crate::services::{RefreshInterval, StatusBoard, StatusMonitor, Task, TaskOutput};

use super::{emit, AppContext};

const LOG_LINES: usize = 10;
const POLL: Duration = Duration::from_millis(200);

/// Arguments for `status`
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Keep checking at an interval
    #[arg(short, long)]
    pub watch: bool,

    /// 5s, 10s, 30s, 1m or 5m (default: monitor_settings.refresh_interval)
    #[arg(short, long)]
    pub interval: Option<RefreshInterval>,

    /// Stop watching after this many rounds
    #[arg(long, requires = "watch")]
    pub rounds: Option<u64>,
}

pub fn handle_status(ctx: &AppContext, args: StatusArgs) -> BillPayResult<()> {
    if args.watch {
        watch(ctx, &args)
    } else {
        check_once(ctx)
    }
}

fn check_once(ctx: &AppContext) -> BillPayResult<()> {
    let dispatcher = ctx.dispatcher()?;
    let tasks = ProviderId::ALL
        .iter()
        .map(|&provider| Task::TestConnection { provider })
        .collect();
    let results = dispatcher.run_all(tasks);
    dispatcher.shutdown();

    let statuses: BillPayResult<Vec<ConnectionStatus>> = results
        .into_iter()
        .map(|result| match result? {
            TaskOutput::Connection(status) => Ok(status),
            other => Err(BillPayError::Dispatch(format!(
                "Unexpected task output: {:?}",
                other
            ))),
        })
        .collect();
    emit(ctx, statuses, "Connection tests finished", |s| {
        format_connection_statuses(s)
    })
}

fn watch(ctx: &AppContext, args: &StatusArgs) -> BillPayResult<()> {
    let interval = args
        .interval
        .unwrap_or(ctx.settings.monitor.refresh_interval);
    let monitor = StatusMonitor::start(ctx.registry(), interval.as_duration(), StatusBoard::shared())?;

    let mut shown = 0;
    loop {
        thread::sleep(POLL);
        let board = monitor
            .board()
            .lock()
            .map_err(|_| BillPayError::Dispatch("Status board lock poisoned".into()))?;
        if board.rounds() == shown {
            continue;
        }
        shown = board.rounds();

        if ctx.json {
            let snapshot: Vec<ConnectionStatus> =
                board.snapshot().into_iter().map(|(_, s)| s).collect();
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            // clear screen, cursor home
            print!("\x1b[2J\x1b[H");
            println!("Provider status (every {}, Ctrl-C to stop)\n", interval);
            print!("{}", format_status_board(&board, LOG_LINES));
        }

        if args.rounds.is_some_and(|limit| shown >= limit) {
            break;
        }
    }

    monitor.stop();
    Ok(())
}
