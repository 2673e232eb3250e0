use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use taskflow::models::{Priority, Task, TaskDraft};
use taskflow::query::{
    self, CategoryFilter, DateRange, FilterOptions, PriorityFilter, SortDirection, SortField, SortOptions,
    StatusFilter,
};

fn fixed_now() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

fn task(title: &str) -> Task {
    let created = fixed_now().with_timezone(&Utc) - Duration::days(30);
    Task::from_draft(TaskDraft::new(title), created).unwrap()
}

fn titles(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.title.as_str()).collect()
}

fn sample() -> Vec<Task> {
    let now = fixed_now().with_timezone(&Utc);
    let mut tasks = Vec::new();

    let mut report = task("Weekly Report");
    report.priority = Priority::High;
    report.category = "Work".to_string();
    report.due_date = Some(now + Duration::days(2));
    tasks.push(report);

    let mut taxes = task("File taxes");
    taxes.category = "Finance".to_string();
    taxes.tags = vec!["report-final".to_string()];
    taxes.due_date = Some(now - Duration::days(5));
    tasks.push(taxes);

    let mut gym = task("gym");
    gym.priority = Priority::Low;
    gym.category = "Health".to_string();
    gym.completed = true;
    gym.progress = 100;
    tasks.push(gym);

    let mut read = task("Read book");
    read.category = "Personal".to_string();
    read.description = "Something about reports? no".to_string();
    tasks.push(read);

    let mut plan = task("Plan trip");
    plan.priority = Priority::High;
    plan.category = "Travel".to_string();
    plan.due_date = Some(now + Duration::days(20));
    tasks.push(plan);

    tasks
}

fn all_filters() -> Vec<FilterOptions> {
    let now = fixed_now().with_timezone(&Utc);
    let mut filters = Vec::new();
    for status in [StatusFilter::All, StatusFilter::Active, StatusFilter::Completed] {
        for category in [CategoryFilter::All, CategoryFilter::Named("Work".to_string())] {
            for priority in [PriorityFilter::All, PriorityFilter::Only(Priority::High)] {
                for date_range in [
                    DateRange::default(),
                    DateRange {
                        start: Some(now),
                        end: Some(now + Duration::days(7)),
                    },
                ] {
                    filters.push(FilterOptions {
                        status,
                        category: category.clone(),
                        priority,
                        date_range,
                    });
                }
            }
        }
    }
    filters
}

#[test]
fn test_query_is_idempotent() {
    let tasks = sample();
    let sort = SortOptions {
        field: SortField::Priority,
        direction: SortDirection::Desc,
    };
    for filter in all_filters() {
        let first = query::query_at(&tasks, &filter, &sort, "re", fixed_now());
        let second = query::query_at(&tasks, &filter, &sort, "re", fixed_now());
        assert_eq!(first, second);
    }
}

#[test]
fn test_filter_is_a_conjunction_of_predicates() {
    let tasks = sample();
    for filter in all_filters() {
        let result = query::query_at(&tasks, &filter, &SortOptions::default(), "", fixed_now());
        for task in &tasks {
            let status_ok = match filter.status {
                StatusFilter::All => true,
                StatusFilter::Active => !task.completed,
                StatusFilter::Completed => task.completed,
            };
            let category_ok = match &filter.category {
                CategoryFilter::All => true,
                CategoryFilter::Named(name) => &task.category == name,
            };
            let priority_ok = match filter.priority {
                PriorityFilter::All => true,
                PriorityFilter::Only(p) => task.priority == p,
            };
            let date_ok = match task.due_date {
                None => true,
                Some(due) => {
                    filter.date_range.start.map_or(true, |s| due >= s)
                        && filter.date_range.end.map_or(true, |e| due <= e)
                }
            };
            let expected = status_ok && category_ok && priority_ok && date_ok;
            let present = result.view.iter().any(|t| t.id == task.id);
            assert_eq!(present, expected, "task {} with filter {:?}", task.title, filter);
        }
    }
}

#[test]
fn test_sort_is_stable_for_equal_keys() {
    let mut tasks = Vec::new();
    for title in ["first", "second", "third", "fourth"] {
        let mut t = task(title);
        t.priority = Priority::Medium;
        tasks.push(t);
    }
    tasks[2].priority = Priority::High;

    for direction in [SortDirection::Asc, SortDirection::Desc] {
        let sort = SortOptions {
            field: SortField::Priority,
            direction,
        };
        let result = query::query_at(&tasks, &FilterOptions::default(), &sort, "", fixed_now());
        let mediums: Vec<&str> = result
            .view
            .iter()
            .filter(|t| t.priority == Priority::Medium)
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(mediums, vec!["first", "second", "fourth"]);
    }
}

#[test]
fn test_stats_ignore_filter_sort_and_search() {
    let tasks = sample();
    let baseline = query::query_at(&tasks, &FilterOptions::default(), &SortOptions::default(), "", fixed_now()).stats;
    assert_eq!(baseline.total, tasks.len());

    for filter in all_filters() {
        let result = query::query_at(
            &tasks,
            &filter,
            &SortOptions {
                field: SortField::Title,
                direction: SortDirection::Desc,
            },
            "nothing matches this",
            fixed_now(),
        );
        assert!(result.view.is_empty());
        assert_eq!(result.stats, baseline);
    }
}

#[test]
fn test_missing_due_date_sorts_last_in_both_directions() {
    let mut a = task("A");
    a.due_date = Some(Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap());
    let b = task("B");
    let tasks = vec![b, a];

    for direction in [SortDirection::Asc, SortDirection::Desc] {
        let sort = SortOptions {
            field: SortField::DueDate,
            direction,
        };
        let result = query::query_at(&tasks, &FilterOptions::default(), &sort, "", fixed_now());
        assert_eq!(titles(&result.view), vec!["A", "B"]);
    }
}

#[test]
fn test_past_due_high_priority_is_overdue_not_upcoming() {
    let mut late = task("late");
    late.priority = Priority::High;
    late.due_date = Some(fixed_now().with_timezone(&Utc) - Duration::days(2));

    let stats = query::query_at(&[late], &FilterOptions::default(), &SortOptions::default(), "", fixed_now()).stats;
    assert_eq!(stats.overdue, 1);
    assert_eq!(stats.upcoming, 0);
    assert_eq!(stats.high_priority, 1);
}

#[test]
fn test_completed_filter_keeps_total() {
    let mut tasks = Vec::new();
    for i in 0..5 {
        let mut t = task(&format!("task {i}"));
        t.completed = i < 3;
        tasks.push(t);
    }
    let filter = FilterOptions {
        status: StatusFilter::Completed,
        ..Default::default()
    };
    let result = query::query_at(&tasks, &filter, &SortOptions::default(), "", fixed_now());
    assert_eq!(result.view.len(), 3);
    assert_eq!(result.stats.total, 5);
    assert_eq!(result.stats.completed, 3);
    assert_eq!(result.stats.completion_rate, 60);
}

#[test]
fn test_toggle_forces_progress_to_full() {
    let mut t = task("halfway");
    t.progress = 40;
    let now = fixed_now().with_timezone(&Utc);

    t.toggle(now);
    assert!(t.completed);
    assert_eq!(t.progress, 100);

    t.toggle(now);
    assert!(!t.completed);
    assert_eq!(t.progress, 100);
}

#[test]
fn test_search_matches_title_and_tags() {
    let tasks = sample();
    let result = query::query_at(
        &tasks,
        &FilterOptions::default(),
        &SortOptions {
            field: SortField::Title,
            direction: SortDirection::Asc,
        },
        "report",
        fixed_now(),
    );
    assert_eq!(titles(&result.view), vec!["File taxes", "Read book", "Weekly Report"]);
    assert!(!result.view.iter().any(|t| t.title == "gym"));
}

#[test]
fn test_search_composes_with_filters() {
    let tasks = sample();
    let filter = FilterOptions {
        category: CategoryFilter::Named("Work".to_string()),
        ..Default::default()
    };
    let result = query::query_at(&tasks, &filter, &SortOptions::default(), "REPORT", fixed_now());
    assert_eq!(titles(&result.view), vec!["Weekly Report"]);
}
