use sensorlink_frame::MESSAGE_TYPE;
use sensorlink_transport::TransportConfig;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("sensorlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let defaults = TransportConfig::default();
    println!("name: sensorlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("SENSORLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("features: async={}, cli=true", cfg!(feature = "async"));
    println!("message_type: {MESSAGE_TYPE:#04x}");
    println!(
        "defaults: resend_timeout_ms={}, max_resends={}, answer_timeout_ms={}, capacity={}",
        defaults.resend_timeout_ms,
        defaults.max_resends,
        defaults.answer_timeout_ms,
        defaults.capacity
    );

    Ok(SUCCESS)
}
