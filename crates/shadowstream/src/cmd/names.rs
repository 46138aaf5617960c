use shadowstream_session::{ChannelRequest, Session};
use tracing::debug;

use crate::cmd::{parse_duration, NamesArgs};
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_names, OutputFormat};

pub fn run(args: NamesArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.connection.session_config()?;
    let timeout = parse_duration(&args.timeout)?;

    let mut session =
        Session::connect(&config).map_err(|err| session_error("connect failed", err))?;

    if !args.channels.is_empty() {
        let request = ChannelRequest::new(args.channels.iter().cloned()).with_inactive(args.inactive);
        session
            .request_channels(&request, Some(timeout))
            .map_err(|err| session_error("channel request failed", err))?;

        // The service announces the requested node list before the first
        // sample, so one decoded sample means the map is current.
        let sample = session
            .next_sample(Some(timeout))
            .map_err(|err| session_error("receive failed", err))?;
        debug!(nodes = sample.len(), "first sample after channel request");
    }

    let names = session
        .name_map()
        .ok_or_else(|| CliError::new(INTERNAL, "no name map after handshake"))?;
    print_names(&config.endpoint.to_string(), &names, format);

    session
        .close()
        .map_err(|err| session_error("close failed", err))?;
    Ok(SUCCESS)
}
