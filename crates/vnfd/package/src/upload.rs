use std::process::Command;

use anyhow::{anyhow, ensure, Result};
use tracing::{info, instrument, Level};

use crate::bundle::Bundle;

const REMOTE_SCRIPT_DIR: &str = "cloud_init";

/// The remote-command channel. Transport security is delegated entirely
/// to the implementation.
pub trait RemoteShell {
    /// Run one command on the remote host and return its exit status.
    fn exec(&mut self, command: &str) -> Result<i32>;
}

/// `ssh(1)` child process per command, the binary resolved from PATH.
pub struct SshShell {
    user: String,
    host: String,
}

impl SshShell {
    pub fn new(user: &str, host: &str) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
        }
    }
}

impl RemoteShell for SshShell {
    fn exec(&mut self, command: &str) -> Result<i32> {
        let ssh = ::which::which("ssh")
            .map_err(|error| anyhow!("failed to find the ssh binary: {error}"))?;
        let status = Command::new(ssh)
            .arg(format!("{}@{}", self.user, self.host))
            .arg(command)
            .status()
            .map_err(|error| {
                anyhow!("failed to spawn a remote command on {:?}: {error}", self.host)
            })?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Single-quote a file body for the remote shell.
fn quoted(content: &str) -> String {
    format!("'{}'", content.replace('\'', r"'\''"))
}

fn exec_step(shell: &mut impl RemoteShell, step: &str, command: &str) -> Result<()> {
    info!("{step}");
    let code = shell
        .exec(command)
        .map_err(|error| anyhow!("failed to {step}: {error}"))?;
    ensure!(
        code == 0,
        "failed to {step}: the remote command exited with status {code}",
    );
    Ok(())
}

/// Push the bundle to the remote home directory and trigger the package
/// creation there. Sequential and blocking; each step is gated on remote
/// exit status 0 and the first failure aborts the protocol.
#[instrument(level = Level::INFO, skip_all, err(Display))]
pub fn upload(shell: &mut impl RemoteShell, bundle: &Bundle) -> Result<()> {
    let id = bundle.id();
    exec_step(
        shell,
        "remove the previous remote directory",
        &format!("rm -rf ~/{id}"),
    )?;
    exec_step(shell, "create the remote directory", &format!("mkdir -p ~/{id}"))?;
    exec_step(
        shell,
        "write the descriptor document",
        &format!(
            "echo {} > ~/{id}/{}",
            quoted(bundle.document()),
            bundle.document_file_name(),
        ),
    )?;
    exec_step(
        shell,
        "create the remote script directory",
        &format!("mkdir -p ~/{id}/{REMOTE_SCRIPT_DIR}"),
    )?;
    for script in bundle.scripts() {
        exec_step(
            shell,
            &format!("write the boot script {:?}", script.name()),
            &format!(
                "echo {} > ~/{id}/{REMOTE_SCRIPT_DIR}/{}",
                quoted(script.content()),
                script.name(),
            ),
        )?;
    }
    exec_step(
        shell,
        "create the remote package",
        &format!("osm nfpkg-create {id}"),
    )?;
    info!("uploaded the package {id:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use vnfd_api::descriptor::{Descriptor, UnitSpec};

    use crate::bundle::BootScript;

    use super::*;

    /// Records every command; fails the nth one with the given status.
    struct MockShell {
        commands: Vec<String>,
        fail_at: Option<(usize, i32)>,
    }

    impl MockShell {
        fn new(fail_at: Option<(usize, i32)>) -> Self {
            Self {
                commands: Vec::default(),
                fail_at,
            }
        }
    }

    impl RemoteShell for MockShell {
        fn exec(&mut self, command: &str) -> Result<i32> {
            let index = self.commands.len();
            self.commands.push(command.into());
            match self.fail_at {
                Some((at, code)) if at == index => Ok(code),
                _ => Ok(0),
            }
        }
    }

    fn sample_bundle() -> Bundle {
        let mut descriptor = Descriptor::create("hackfest", None, None, None).unwrap();
        descriptor
            .add_image("ubuntu20.04", "./iso/ubuntu20.04", None, None)
            .unwrap();
        descriptor
            .add_unit(UnitSpec {
                id: "u1".into(),
                num_virtual_cpu: 2,
                memory_size_gib: 4.0,
                storage_sizes_gib: vec![16.0],
                images: vec!["ubuntu20.04".into()],
                ext_cp_ids: vec!["mgmt".into()],
                boot_script: Some("u1-init".into()),
                ..Default::default()
            })
            .unwrap();
        Bundle::assemble(
            &descriptor,
            vec![BootScript::new("u1-init", "#cloud-config\nhostname: u1\n")],
        )
        .unwrap()
    }

    #[test]
    fn protocol_runs_every_step_in_order() {
        let bundle = sample_bundle();
        let mut shell = MockShell::new(None);
        upload(&mut shell, &bundle).unwrap();

        assert_eq!(shell.commands.len(), 6);
        assert_eq!(shell.commands[0], "rm -rf ~/hackfest");
        assert_eq!(shell.commands[1], "mkdir -p ~/hackfest");
        assert!(shell.commands[2].ends_with("> ~/hackfest/hackfest_vnfd.yaml"));
        assert_eq!(shell.commands[3], "mkdir -p ~/hackfest/cloud_init");
        assert!(shell.commands[4].ends_with("> ~/hackfest/cloud_init/u1-init"));
        assert_eq!(shell.commands[5], "osm nfpkg-create hackfest");
    }

    #[test]
    fn protocol_stops_at_the_first_failing_step() {
        let bundle = sample_bundle();
        let mut shell = MockShell::new(Some((2, 1)));

        let error = upload(&mut shell, &bundle).unwrap_err();
        assert!(error
            .to_string()
            .contains("failed to write the descriptor document"));
        assert_eq!(shell.commands.len(), 3);
    }

    #[test]
    fn file_bodies_are_shell_quoted() {
        assert_eq!(quoted("plain"), "'plain'");
        assert_eq!(quoted("it's"), r"'it'\''s'");
    }
}
