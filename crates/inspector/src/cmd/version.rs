use inspector_wire::{DEFAULT_MAX_PAYLOAD, SEND_COMMAND_VERB};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("inspector {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: inspector");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("INSPECTOR_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("command_verb: {SEND_COMMAND_VERB}");
    println!("max_frame_payload: {DEFAULT_MAX_PAYLOAD}");
    println!("transports: unix-socket");

    Ok(SUCCESS)
}
