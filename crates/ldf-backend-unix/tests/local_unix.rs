//! Reconciliation against a fake system root.
//!
//! The recording runner edits `etc/passwd` and `etc/group` the way
//! shadow-utils would, so the backend reads back its own changes.

use std::cell::RefCell;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use ldf_adapter::Adapter;
use ldf_backend::{Backend, DeletionOrder};
use ldf_backend_unix::{RecordingRunner, UnixBackend, UnixConfig};
use ldf_core::Config;
use ldf_model::{Outcome, SshKey, State, Target, UserInfo};
use tempfile::TempDir;

const UNIQUE_ID: &str = "abc123@https://issuer.example.org";
const ENCODED_ID: &str = "abc123@https%3A//issuer.example.org";

struct FakeSystem {
    dir: TempDir,
    uid: u32,
    gid: u32,
}

impl FakeSystem {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc/passwd"), "root:x:0:0:root:/root:/bin/bash\n").unwrap();
        fs::write(dir.path().join("etc/group"), "root:x:0:\nusers:x:100:\n").unwrap();
        let meta = fs::metadata(dir.path()).unwrap();
        Self {
            uid: meta.uid(),
            gid: meta.gid(),
            dir,
        }
    }

    fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    fn passwd(&self) -> String {
        fs::read_to_string(self.dir.path().join("etc/passwd")).unwrap()
    }

    fn group(&self) -> String {
        fs::read_to_string(self.dir.path().join("etc/group")).unwrap()
    }

    fn add_passwd_line(&self, line: &str) {
        append(&self.dir.path().join("etc/passwd"), line);
    }

    fn add_group_line(&self, line: &str) {
        append(&self.dir.path().join("etc/group"), line);
    }

    /// A runner that applies useradd, userdel, usermod, chage, groupadd and
    /// groupmod to the fake root.
    fn runner(&self) -> RecordingRunner {
        let root = self.root();
        let (uid, gid) = (self.uid, self.gid);
        let expiry: RefCell<Option<NaiveDate>> = RefCell::new(None);

        let passwd = root.join("etc/passwd");
        let group = root.join("etc/group");
        let home_root = root.clone();
        let useradd_passwd = passwd.clone();
        let userdel_passwd = passwd.clone();
        let usermod_passwd = passwd;
        let groupadd_group = group.clone();
        let groupmod_group = group;

        RecordingRunner::new()
            .on("useradd", move |args| {
                let (gecos, shell, base, name) = (&args[1], &args[5], &args[7], &args[9]);
                let home = format!("{base}/{name}");
                fs::create_dir_all(home_root.join(home.trim_start_matches('/'))).unwrap();
                append(
                    &useradd_passwd,
                    &format!("{name}:x:{uid}:{gid}:{gecos}:{home}:{shell}"),
                );
                Ok(String::new())
            })
            .on("userdel", move |args| {
                rewrite(&userdel_passwd, |line| {
                    (!line.starts_with(&format!("{}:", args[0]))).then(|| line.to_string())
                });
                Ok(String::new())
            })
            .on("usermod", move |args| {
                if args[0] == "-s" {
                    let (shell, name) = (&args[1], &args[2]);
                    rewrite(&usermod_passwd, |line| {
                        if !line.starts_with(&format!("{name}:")) {
                            return Some(line.to_string());
                        }
                        let mut fields: Vec<&str> = line.split(':').collect();
                        fields[6] = shell.as_str();
                        Some(fields.join(":"))
                    });
                }
                Ok(String::new())
            })
            .on("groupadd", move |args| {
                append(&groupadd_group, &format!("{}:x:2000:", args[0]));
                Ok(String::new())
            })
            .on("groupmod", move |args| {
                let (to, from) = (&args[1], &args[2]);
                rewrite(&groupmod_group, |line| {
                    Some(match line.strip_prefix(&format!("{from}:")) {
                        Some(rest) => format!("{to}:{rest}"),
                        None => line.to_string(),
                    })
                });
                Ok(String::new())
            })
            .on("chage", move |args| {
                if args[0] == "-E" {
                    *expiry.borrow_mut() = match args[1].as_str() {
                        "-1" => None,
                        date => Some(NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()),
                    };
                    return Ok(String::new());
                }
                let expires = expiry
                    .borrow()
                    .map_or_else(|| "never".to_string(), |d| d.format("%b %d, %Y").to_string());
                Ok(format!(
                    "Last password change\t\t\t\t\t: Oct 01, 2026\n\
                     Account expires\t\t\t\t\t\t: {expires}\n"
                ))
            })
    }

    fn backend(&self, config: UnixConfig) -> UnixBackend<RecordingRunner> {
        UnixBackend::with_runner(config, self.runner()).unwrap()
    }

    fn config(&self) -> UnixConfig {
        UnixConfig::builder()
            .root(self.root())
            .shell("/bin/bash")
            .login_info("ssh_host", "login.example.org")
            .build()
            .unwrap()
    }
}

fn append(path: &Path, line: &str) {
    let mut content = fs::read_to_string(path).unwrap();
    content.push_str(line);
    content.push('\n');
    fs::write(path, content).unwrap();
}

fn rewrite(path: &Path, f: impl Fn(&str) -> Option<String>) {
    let content = fs::read_to_string(path).unwrap();
    let lines: Vec<String> = content.lines().filter_map(f).collect();
    fs::write(path, lines.join("\n") + "\n").unwrap();
}

fn jdoe() -> UserInfo {
    UserInfo::new(UNIQUE_ID)
        .with_preferred_username("jdoe")
        .with_name("Jane", "Doe")
        .with_groups(["hpc"])
        .with_assurance(["https://refeds.org/assurance/profile/cappuccino"])
        .with_ssh_key(SshKey::new("laptop", "1", "ssh-ed25519 AAAAC3Nza jdoe@laptop"))
        .with_ssh_key(SshKey::new("desktop", "2", "ssh-rsa AAAAB3Nza jdoe@desktop"))
}

#[test]
fn deploy_creates_account_groups_and_keys() {
    let system = FakeSystem::new();
    let backend = system.backend(system.config());
    let config = Config::default();
    let adapter = Adapter::new(&config, &backend).unwrap();

    let outcome = adapter.reach_state(&jdoe(), Target::Deployed);
    let Outcome::Deployed { credentials, message } = &outcome else {
        panic!("expected deployed, got {outcome:?}");
    };
    assert_eq!(
        message,
        "User was created and was added to groups hpc. \
         Credentials ssh:laptop/1,ssh:desktop/2 were activated."
    );
    assert_eq!(credentials["commandline"], "ssh jdoe@login.example.org");

    assert!(system.group().contains("hpc:x:2000:"));
    assert!(system
        .passwd()
        .contains(&format!("jdoe:x:{}:{}:{ENCODED_ID}:/home/jdoe:/bin/bash", system.uid, system.gid)));

    let keys = system.root().join("home/jdoe/.ssh/authorized_keys");
    assert_eq!(
        fs::read_to_string(&keys).unwrap(),
        "ssh-ed25519 AAAAC3Nza jdoe@laptop\nssh-rsa AAAAB3Nza jdoe@desktop"
    );
    assert_eq!(fs::metadata(&keys).unwrap().mode() & 0o777, 0o600);

    assert_eq!(
        backend.runner().calls(),
        vec![
            "groupadd hpc".to_string(),
            format!(
                "useradd --comment {ENCODED_ID} -g hpc --shell /bin/bash -b /home -m jdoe"
            ),
            "usermod --append --groups hpc jdoe".to_string(),
        ]
    );
}

#[test]
fn lifecycle_round_trip() {
    let system = FakeSystem::new();
    let backend = system.backend(system.config());
    let config = Config::default();
    let adapter = Adapter::new(&config, &backend).unwrap();
    let info = jdoe();

    adapter.reach_state(&info, Target::Deployed);
    assert_eq!(
        adapter.reach_state(&info, Target::GetStatus),
        Outcome::status(State::Deployed, "username jdoe")
    );

    assert_eq!(adapter.reach_state(&info, Target::Limited).state_name(), "limited");
    assert!(system.passwd().contains(":/home/jdoe:/sbin/nologin"));
    assert_eq!(adapter.reach_state(&info, Target::GetStatus).state_name(), "limited");

    assert_eq!(adapter.reach_state(&info, Target::Unlimited).state_name(), "deployed");
    assert!(system.passwd().contains(":/home/jdoe:/bin/bash"));

    assert_eq!(adapter.reach_state(&info, Target::Suspended).state_name(), "suspended");
    assert_eq!(adapter.reach_state(&info, Target::GetStatus).state_name(), "suspended");
    assert_eq!(adapter.reach_state(&info, Target::Resumed).state_name(), "deployed");
}

#[test]
fn undeploy_removes_keys_then_account() {
    let system = FakeSystem::new();
    let backend = system.backend(system.config());
    let config = Config::default();
    let adapter = Adapter::new(&config, &backend).unwrap();

    adapter.reach_state(&jdoe(), Target::Deployed);
    let keys = system.root().join("home/jdoe/.ssh/authorized_keys");
    assert!(keys.exists());

    let outcome = adapter.reach_state(&jdoe(), Target::NotDeployed);
    assert_eq!(
        outcome.message(),
        format!("User 'jdoe ({UNIQUE_ID})' was removed.")
    );
    assert!(!keys.exists());
    assert!(!system.passwd().contains("jdoe:"));

    let calls = backend.runner().calls();
    assert_eq!(&calls[calls.len() - 2..], ["/usr/bin/pkill -u jdoe", "userdel jdoe"]);
}

#[test]
fn account_first_deletion_still_removes_keys() {
    let system = FakeSystem::new();
    let config = UnixConfig::builder()
        .root(system.root())
        .deletion_order(DeletionOrder::AccountFirst)
        .build()
        .unwrap();
    let backend = system.backend(config);
    assert_eq!(backend.deletion_order(), DeletionOrder::AccountFirst);

    let adapter_config = Config::default();
    let adapter = Adapter::new(&adapter_config, &backend).unwrap();
    adapter.reach_state(&jdoe(), Target::Deployed);
    let keys = system.root().join("home/jdoe/.ssh/authorized_keys");
    assert!(keys.exists());

    let outcome = adapter.reach_state(&jdoe(), Target::NotDeployed);
    assert_eq!(outcome.state_name(), "not_deployed", "{outcome:?}");
    assert!(!system.passwd().contains("jdoe:"));
    assert!(system.root().join("home/jdoe").exists());
    assert!(!keys.exists());

    let calls = backend.runner().calls();
    assert_eq!(calls.last().map(String::as_str), Some("userdel jdoe"));
}

#[test]
fn names_are_sanitized_and_taken_names_skipped() {
    let system = FakeSystem::new();
    system.add_passwd_line("jdoe:x:1500:100:someone@else:/home/jdoe:/bin/sh");
    let backend = system.backend(system.config());
    let config = Config::default();
    let adapter = Adapter::new(&config, &backend).unwrap();

    let info = jdoe().with_groups(["Fürther e.V."]);
    let outcome = adapter.reach_state(&info, Target::Deployed);
    assert_eq!(outcome.state_name(), "deployed", "{outcome:?}");

    let calls = backend.runner().calls();
    assert_eq!(calls[0], "groupadd fuerther_e_v_");
    assert!(calls[1].ends_with("-g fuerther_e_v_ --shell /bin/bash -b /home -m jane"));
}

#[test]
fn legacy_group_is_renamed_with_groupmod() {
    let system = FakeSystem::new();
    system.add_group_line("f.._informationstechnikve.._e_v_:x:1500:");
    let backend = system.backend(system.config());
    let config = Config::default();
    let adapter = Adapter::new(&config, &backend).unwrap();

    let info = jdoe().with_groups(["Fürther Informationstechnikverein e.V."]);
    let outcome = adapter.reach_state(&info, Target::Deployed);
    assert_eq!(outcome.state_name(), "deployed", "{outcome:?}");

    assert_eq!(
        backend.runner().calls()[0],
        "groupmod --new-name fuerther_..onstechnikverein_e_v_ f.._informationstechnikve.._e_v_"
    );
    assert!(system.group().contains("fuerther_..onstechnikverein_e_v_:x:1500:"));
}

#[test]
fn failing_useradd_is_a_failure() {
    let system = FakeSystem::new();
    let runner = RecordingRunner::new().failing("useradd", "useradd: cannot lock /etc/passwd");
    let backend = UnixBackend::with_runner(system.config(), runner).unwrap();
    let config = Config::default();
    let adapter = Adapter::new(&config, &backend).unwrap();

    let outcome = adapter.reach_state(&jdoe(), Target::Deployed);
    assert_eq!(
        outcome,
        Outcome::failed("Cannot create user: useradd: useradd: cannot lock /etc/passwd")
    );
}

#[test]
fn disabled_key_deployment_writes_nothing() {
    let system = FakeSystem::new();
    let config = UnixConfig::builder()
        .root(system.root())
        .deploy_user_ssh_keys(false)
        .build()
        .unwrap();
    let backend = system.backend(config);
    let adapter_config = Config::default();
    let adapter = Adapter::new(&adapter_config, &backend).unwrap();

    adapter.reach_state(&jdoe(), Target::Deployed);
    assert!(!system.root().join("home/jdoe/.ssh").exists());
}

#[test]
fn dropping_every_key_empties_authorized_keys() {
    let system = FakeSystem::new();
    let backend = system.backend(system.config());
    let config = Config::default();
    let adapter = Adapter::new(&config, &backend).unwrap();

    adapter.reach_state(&jdoe(), Target::Deployed);
    let keys = system.root().join("home/jdoe/.ssh/authorized_keys");
    assert!(keys.exists());

    let mut without_keys = jdoe();
    without_keys.ssh_keys.clear();
    let outcome = adapter.reach_state(&without_keys, Target::Deployed);
    assert_eq!(outcome.state_name(), "deployed", "{outcome:?}");
    assert!(!keys.exists());
}

#[test]
fn unreadable_passwd_reports_unknown_status() {
    let dir = tempfile::tempdir().unwrap();
    let config = UnixConfig::builder().root(dir.path()).build().unwrap();
    let backend = UnixBackend::with_runner(config, RecordingRunner::new()).unwrap();
    let adapter_config = Config::default();
    let adapter = Adapter::new(&adapter_config, &backend).unwrap();

    assert_eq!(
        adapter.reach_state(&jdoe(), Target::GetStatus),
        Outcome::status(State::Unknown, "No message")
    );
    assert_eq!(adapter.reach_state(&jdoe(), Target::Deployed).state_name(), "failed");
    assert!(backend.runner().calls().is_empty());
}
