// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `netpipe loopback` command - Run both roles in one process.
//!
//! The receiver runs on a second thread and the two roles talk over
//! loopback TCP, so the stack is exercised without a second host.

use std::thread;

use anyhow::{anyhow, Context};
use netpipe_core::{ConfigLoader, TcpOptions, TcpTransport};

use crate::args::BenchArgs;

const LOOPBACK_HOST: &str = "127.0.0.1";

pub fn execute(args: &BenchArgs, peer_cpu: Option<String>) -> anyhow::Result<()> {
    let settings = args.to_settings()?;
    let transmitter_config =
        ConfigLoader::validate(settings.clone().with_host(Some(LOOPBACK_HOST.to_string())))
            .context("Invalid benchmark configuration")?;
    let receiver_config = ConfigLoader::validate(settings.with_host(None))
        .context("Invalid benchmark configuration")?;
    super::announce(&transmitter_config);

    let options = TcpOptions {
        socket_buffer: transmitter_config.socket_buffer,
        ..Default::default()
    };
    let port = transmitter_config.port.value();
    let listener = TcpTransport::bind(port)?;

    let receiver_args = BenchArgs {
        output: None,
        json: None,
        ..args.clone()
    };
    let receiver_options = options.clone();
    let receiver = thread::Builder::new()
        .name("netpipe-receiver".to_string())
        .spawn(move || -> anyhow::Result<()> {
            super::pin(peer_cpu.as_deref())?;
            let transport = TcpTransport::accept(listener, receiver_options)?;
            super::drive(receiver_config, transport, &receiver_args)
        })
        .context("Failed to spawn receiver thread")?;

    super::pin(args.cpu.as_deref())?;
    let transmitted = TcpTransport::connect(LOOPBACK_HOST, port, options)
        .map_err(anyhow::Error::from)
        .and_then(|transport| super::drive(transmitter_config, transport, args));

    let received = receiver
        .join()
        .map_err(|_| anyhow!("Receiver thread panicked"))?;

    transmitted?;
    received.context("Receiver failed")
}
