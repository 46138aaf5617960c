use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shadowstream_session::{ChannelRequest, Session, SessionError};
use tracing::{info, warn};

use crate::cmd::{parse_duration, StreamArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS};
use crate::output::{print_sample, OutputFormat};

pub fn run(args: StreamArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.connection.session_config()?;
    let timeout = parse_duration(&args.timeout)?;

    let mut session =
        Session::connect(&config).map_err(|err| session_error("connect failed", err))?;
    info!(peer = %session.peer_addr(), "connected to data service");

    if !args.channels.is_empty() {
        let request = ChannelRequest::new(args.channels.iter().cloned()).with_inactive(args.inactive);
        session
            .request_channels(&request, Some(timeout))
            .map_err(|err| session_error("channel request failed", err))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0u64;
    let mut skipped = 0u64;

    while running.load(Ordering::SeqCst) {
        let sample = match session.next_sample(Some(timeout)) {
            Ok(sample) => sample,
            Err(SessionError::Timeout(_)) if !running.load(Ordering::SeqCst) => break,
            Err(err @ (SessionError::MalformedPayload(_) | SessionError::MalformedMetadata(_)))
                if !args.strict =>
            {
                skipped = skipped.saturating_add(1);
                warn!(error = %err, skipped, "skipping invalid message");
                continue;
            }
            Err(err) => return Err(session_error("receive failed", err)),
        };

        let names = session.name_map();
        print_sample(printed, &sample, names.as_deref(), format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    info!(printed, skipped, "stream finished");
    session
        .close()
        .map_err(|err| session_error("close failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
