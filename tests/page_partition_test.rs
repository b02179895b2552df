use tex_autograder::error::PageAssignError;
use tex_autograder::services::page_assigner::{partition_pages, problem_marker};

/// 按每题页数生成逐页文本
fn render(pages_per_problem: &[usize]) -> Vec<String> {
    let mut pages = Vec::new();
    for (idx, &count) in pages_per_problem.iter().enumerate() {
        pages.push(format!("{} (10 points)", problem_marker(idx + 1)));
        for extra in 1..count {
            pages.push(format!("scratch work {}", extra));
        }
    }
    pages
}

#[test]
fn test_groups_cover_every_page_in_order() {
    let layouts: [&[usize]; 5] = [&[1], &[1, 1, 1], &[3, 1, 2], &[1, 4], &[2, 2, 2, 2, 1]];
    for layout in layouts {
        let pages = render(layout);
        let groups = partition_pages(&pages, layout.len()).unwrap();

        assert_eq!(groups.len(), layout.len());
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, layout);
        let flattened: Vec<usize> = groups.into_iter().flatten().collect();
        assert_eq!(flattened, (0..pages.len()).collect::<Vec<_>>());
    }
}

#[test]
fn test_extra_markers_beyond_expected_form_extra_groups() {
    let pages = render(&[1, 1, 1]);
    let groups = partition_pages(&pages, 2).unwrap();
    assert_eq!(groups.len(), 3);
}

#[test]
fn test_out_of_order_marker_is_not_matched() {
    let pages = vec![
        "Problem 1".to_string(),
        "Problem 3".to_string(),
        "Problem 2".to_string(),
    ];
    assert_eq!(
        partition_pages(&pages, 3),
        Err(PageAssignError::TooFewGroups {
            found: 2,
            expected: 3
        })
    );
}
