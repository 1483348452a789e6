use std::fs;

use alphatest::{
    Aggregator, AveragePolicy, Campaign, CampaignConfig, DatasetWriter, DateId, RecordingRunner,
    ReportScanner, Selection, Statistic, build_report,
};

fn single_mode_config(output: &std::path::Path) -> CampaignConfig {
    CampaignConfig {
        output: output.to_path_buf(),
        modes: [("N".to_string(), "x:0:0".to_string())].into_iter().collect(),
        associations: vec![1, 2],
        repeats: 1,
        ..CampaignConfig::default()
    }
}

#[test]
fn test_single_mode_campaign_writes_one_log_per_cell() {
    let dir = tempfile::tempdir().unwrap();
    let config = single_mode_config(dir.path());
    config.validate().unwrap();
    let runner = RecordingRunner::new();

    let summary = Campaign::new(&config, &runner)
        .with_date(DateId::parse("20240101-000000").unwrap())
        .run("single mode")
        .unwrap();

    assert_eq!(summary.cells, 2);
    assert_eq!(
        summary.logs,
        vec![
            dir.path().join("20240101-000000-N-01.log"),
            dir.path().join("20240101-000000-N-02.log"),
        ]
    );

    for log in &summary.logs {
        let text = fs::read_to_string(log).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("Starting run 0. mode=N"));
        assert_eq!(lines.last(), Some(&""));
    }

    // Subject launched once per cell, each with its own slot
    let subjects = runner.calls_to(&config.tools.subject);
    assert_eq!(subjects.len(), 2);
    assert_eq!(subjects[0].args.last().map(String::as_str), Some("1:0:0"));
    assert_eq!(subjects[1].args.last().map(String::as_str), Some("2:0:0"));

    assert_eq!(
        fs::read_to_string(dir.path().join("20240101-000000.log")).unwrap(),
        "single mode iperfp=-f k -t 30\n"
    );
}

#[test]
fn test_campaign_then_report() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    fs::create_dir(&logs).unwrap();

    let mut config = single_mode_config(&logs);
    config.repeats = 3;
    let runner = RecordingRunner::new().with_output(
        &config.tools.throughput,
        "[ ID] Interval       Transfer     Bandwidth\n\
         [  3]  0.0-30.0 sec  337152 KBytes  92000 Kbits/sec\n",
    );

    let date = DateId::parse("20240101-000000").unwrap();
    Campaign::new(&config, &runner)
        .with_date(date.clone())
        .run("end to end")
        .unwrap();

    let scanner = ReportScanner::new(&logs);
    assert_eq!(
        scanner.select(None).unwrap(),
        Selection::Selected(date.clone())
    );

    let report = build_report(&scanner, &date, &Aggregator::new(AveragePolicy::Mean)).unwrap();
    assert_eq!(report.series.len(), 1);
    let rows = &report.series[0].rows;
    assert_eq!(rows.len(), 2);
    for (row, number) in rows.iter().zip([1, 2]) {
        assert_eq!(row.number, number);
        assert_eq!(row.samples, vec![92000.0; 3]);
        assert_eq!(row.statistic, Statistic::Mean(92000.0));
    }

    let plot_dir = dir.path().join("gnuplot");
    let mut console = Vec::new();
    DatasetWriter::new(&plot_dir)
        .write_all(&report.series, &mut console)
        .unwrap();
    assert_eq!(
        fs::read_to_string(plot_dir.join("N.dat")).unwrap(),
        " 1 92000.00 (92000.0, 92000.0, 92000.0)\n 2 92000.00 (92000.0, 92000.0, 92000.0)\n"
    );
}

#[test]
fn test_failing_tools_do_not_stop_the_campaign() {
    let dir = tempfile::tempdir().unwrap();
    let config = single_mode_config(dir.path());
    let runner = RecordingRunner::new()
        .failing(&config.tools.subject)
        .failing(&config.tools.throughput)
        .failing(&config.tools.kill);

    let summary = Campaign::new(&config, &runner).run("broken tools").unwrap();

    assert_eq!(summary.cells, 2);
    assert_eq!(runner.calls_to(&config.tools.subject).len(), 2);
    assert_eq!(runner.calls_to(&config.tools.remove).len(), 2);
    assert!(summary.logs.iter().all(|log| log.exists()));
}
