use librtc::{
    CalendarTime, Error, Rtc, RtcConfig, SiBus, Session,
    calendar::SECONDS_PER_DAY,
};
use pif_emu::{Console, ConsoleConfig, Direction};

// 2024-02-29 12:34:56
const POWER_ON: i64 = 1_709_210_096;

fn rtc_with(config: ConsoleConfig) -> Rtc<Console> {
    Rtc::new(Console::new(config), RtcConfig::default())
}

fn settled_rtc() -> Rtc<Console> {
    let mut rtc = rtc_with(ConsoleConfig::default());
    assert!(rtc.init());
    while !rtc.ready() {}
    rtc
}

#[test]
fn reads_time_from_present_rtc() {
    let mut rtc = rtc_with(ConsoleConfig::default());
    assert_eq!(rtc.session(), Session::Uninitialized);

    let tm = rtc.get_time_raw().unwrap();
    assert_eq!(rtc.session(), Session::Ready);
    assert_eq!(tm.to_unix_time(), POWER_ON);
    assert_eq!((tm.hour, tm.min, tm.sec), (12, 34, 56));
    assert_eq!((tm.wday, tm.yday, tm.isdst), (4, 59, -1));
}

#[test]
fn missing_rtc_reports_not_present() {
    let mut rtc = rtc_with(ConsoleConfig { rtc_present: false, ..Default::default() });
    assert!(!rtc.init());
    assert_eq!(rtc.session(), Session::NotPresent);
    assert!(!rtc.is_present());
    assert!(rtc.ready());

    let err = rtc.get_time_raw().unwrap_err();
    assert_eq!(err, Error::NotPresent);
    assert_eq!(err.fallback(), CalendarTime::EPOCH);
    assert_eq!(rtc.get_time(), Err(Error::NotPresent));
    assert_eq!(rtc.get_time_of_day(), -1);

    rtc.set_offset(42);
    assert_eq!(rtc.set_time(&CalendarTime::from_date(2030, 1, 1)), 42);
}

#[test]
fn missing_rtc_restores_caller_state() {
    let mut rtc = rtc_with(ConsoleConfig {
        rtc_present: false,
        dram_addr: 0x0012_3450,
        ..Default::default()
    });
    assert!(!rtc.init());

    let console = rtc.hardware_mut();
    assert!(console.interrupts_enabled());
    assert_eq!(console.dram_addr(), 0x0012_3450);
    assert_eq!(console.pif_ram()[63], 1);
}

#[test]
fn foreign_command_block_survives_a_read() {
    // controller status on channel 0, then end of commands
    let mut controller = [0u8; 64];
    controller[..8].copy_from_slice(&[0x01, 0x03, 0x00, 0xFF, 0xFF, 0xFF, 0xFE, 0x00]);

    let mut rtc = rtc_with(ConsoleConfig::default());
    rtc.hardware_mut().load_pif_ram(&controller);
    rtc.get_time_raw().unwrap();

    let ram = rtc.hardware().pif_ram();
    assert_eq!(ram[..63], controller[..63]);
    assert_eq!(ram[63], 1);
}

#[test]
fn init_probes_once() {
    let mut rtc = rtc_with(ConsoleConfig::default());
    assert!(rtc.init());
    let stats = rtc.hardware().stats;
    assert!(rtc.init());
    assert_eq!(rtc.hardware().stats, stats);
}

#[test]
fn init_starts_the_clock() {
    let rtc = settled_rtc();
    let console = rtc.into_inner();
    assert_eq!(console.rtc().unwrap().control(), &[0x03, 0, 0, 0, 0, 0, 0, 0]);
    // identify, read control, write control
    assert_eq!(console.stats.joybus_runs, 3);
}

#[test]
fn exec_on_write_is_detected_and_neutralized() {
    let mut rtc = rtc_with(ConsoleConfig { exec_on_write: true, ..Default::default() });
    assert!(rtc.init());
    assert!(rtc.exec_on_write_bug());

    let console = rtc.hardware();
    assert_eq!(console.stats.joybus_runs, 3);
    assert_eq!(console.pif_ram()[63], 0);

    let restore = console.history().last().unwrap();
    assert_eq!(restore.direction, Direction::Write);
    assert!(!restore.executed);
}

#[test]
fn exec_on_write_detected_without_rtc() {
    let mut rtc = rtc_with(ConsoleConfig {
        exec_on_write: true,
        rtc_present: false,
        ..Default::default()
    });
    assert!(!rtc.init());
    assert!(rtc.exec_on_write_bug());
}

#[test]
fn accurate_pif_gets_reparse_bit() {
    let mut rtc = rtc_with(ConsoleConfig::default());
    assert!(rtc.init());
    assert!(!rtc.exec_on_write_bug());
    assert_eq!(rtc.hardware().pif_ram()[63], 1);
}

#[test]
fn transactions_run_with_interrupts_off() {
    let mut rtc = rtc_with(ConsoleConfig::default());
    rtc.get_time_raw().unwrap();

    let console = rtc.hardware();
    assert!(console.interrupts_enabled());
    assert!(console.history().count() > 0);
    assert!(console.history().all(|e| !e.interrupts_enabled));
}

#[test]
fn disabled_interrupts_stay_disabled() {
    let mut rtc = rtc_with(ConsoleConfig { interrupts_enabled: false, ..Default::default() });
    rtc.get_time_raw().unwrap();
    assert!(!rtc.hardware().interrupts_enabled());
    assert_eq!(rtc.hardware().stats.interrupt_toggles, 0);
}

#[test]
fn dram_addr_is_restored() {
    let mut rtc = rtc_with(ConsoleConfig { dram_addr: 0x0023_4560, ..Default::default() });
    rtc.get_time_raw().unwrap();
    assert_eq!(rtc.hardware_mut().dram_addr(), 0x0023_4560);
}

#[test]
fn busy_si_yields_only_if_interrupts_were_on() {
    let mut rtc = rtc_with(ConsoleConfig { busy_on_start: 10, ..Default::default() });
    assert!(rtc.init());
    assert!(rtc.hardware().stats.yields > 0);

    let mut rtc = rtc_with(ConsoleConfig {
        busy_on_start: 10,
        interrupts_enabled: false,
        ..Default::default()
    });
    assert!(rtc.init());
    assert_eq!(rtc.hardware().stats.yields, 0);
}

#[test]
fn cache_is_maintained_around_dma() {
    let mut rtc = rtc_with(ConsoleConfig::default());
    rtc.get_time_raw().unwrap();
    let stats = rtc.hardware().stats;
    assert_eq!(stats.writebacks, stats.dma_writes);
    assert_eq!(stats.invalidates, stats.dma_reads);
}

#[test]
fn ready_is_false_before_init() {
    let mut rtc = rtc_with(ConsoleConfig::default());
    assert!(!rtc.ready());
    assert_eq!(rtc.session(), Session::Uninitialized);
}

#[test]
fn settle_window_is_honoured() {
    let mut rtc = rtc_with(ConsoleConfig::default());
    assert!(rtc.init());
    assert_eq!(rtc.session(), Session::Settling);
    assert!(!rtc.ready());

    let settle = rtc.config().settle_cycles() as u64;
    rtc.hardware_mut().advance_cycles(settle);
    assert!(rtc.ready());
    assert_eq!(rtc.session(), Session::Ready);
}

#[test]
fn settle_window_survives_counter_wrap() {
    let mut rtc = rtc_with(ConsoleConfig { initial_count: u32::MAX - 5_000, ..Default::default() });
    assert!(rtc.init());
    assert!(!rtc.ready());
    assert!(!rtc.ready());

    rtc.hardware_mut().advance_seconds(1);
    assert!(rtc.ready());
}

#[test]
fn emulators_skip_the_settle_window() {
    let mut rtc = rtc_with(ConsoleConfig { emulator: true, ..Default::default() });
    assert!(rtc.init());
    assert_eq!(rtc.session(), Session::Ready);
}

#[test]
fn zero_settle_time_skips_the_window() {
    let config = RtcConfig { settle_ms: 0, ..RtcConfig::default() };
    let mut rtc = Rtc::new(Console::default(), config);
    assert!(rtc.init());
    assert_eq!(rtc.session(), Session::Ready);
}

#[test]
fn time_follows_uptime() {
    let mut rtc = settled_rtc();
    rtc.hardware_mut().advance_seconds(90);
    assert_eq!(rtc.get_time_raw().unwrap().to_unix_time(), POWER_ON + 90);
}

#[test]
fn time_written_to_the_chip_is_read_back() {
    let mut rtc = settled_rtc();
    rtc.hardware_mut().rtc_mut().unwrap().set_unix_time(4_102_444_799);
    let tm = rtc.get_time_raw().unwrap();
    assert_eq!((tm.year, tm.mon, tm.mday), (199, 11, 31));
    assert_eq!(tm.to_unix_time(), 4_102_444_799);
}

#[test]
fn set_time_then_get_time() {
    let mut rtc = settled_rtc();
    let target = CalendarTime::from_date(2030, 6, 15).at(8, 0, 0);

    let offset = rtc.set_time(&target);
    assert_eq!(offset, target.to_unix_time() - POWER_ON);
    assert_eq!(rtc.offset(), offset);

    let now = rtc.get_time().unwrap();
    assert_eq!(now.to_unix_time(), target.to_unix_time());
    assert_eq!((now.year, now.mon, now.mday, now.wday), (130, 5, 15, 6));
}

#[test]
fn zero_offset_returns_raw_reading() {
    let mut rtc = settled_rtc();
    assert_eq!(rtc.get_time(), rtc.get_time_raw());
    assert_eq!(rtc.get_time().unwrap().isdst, -1);
}

#[test]
fn negative_offset() {
    let mut rtc = settled_rtc();
    rtc.set_offset(-SECONDS_PER_DAY * 366);
    let tm = rtc.get_time().unwrap();
    assert_eq!((tm.year, tm.mon, tm.mday), (123, 1, 28));
}

#[test]
fn time_of_day() {
    let mut rtc = settled_rtc();
    assert_eq!(rtc.get_time_of_day(), 45_296);

    rtc.set_offset(-50_000);
    assert_eq!(rtc.get_time_of_day(), 81_696);

    rtc.set_offset(-3 * SECONDS_PER_DAY - 10);
    assert_eq!(rtc.get_time_of_day(), 45_286);

    rtc.set_offset(41_104);
    assert_eq!(rtc.get_time_of_day(), 0);
}
